//! Backend dispatch and the [`TrajectoryReader`] facade.
//!
//! A [`TrajectoryReader`] wraps one storage backend and exposes the
//! logged trajectory through lazy step, episode and episode-metadata
//! views, plus the environment specs decoded from the backend metadata.
//!
//! Backends are chosen with a [`BackendSelector`]: a ready
//! [`BackendReader`](trajlog_core::BackendReader), a [`BackendKind`], or a
//! kind name such as `"log"` or `"in_memory"`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod error;
pub mod reader;

pub use backend::{BackendArg, BackendArgs, BackendFactory, BackendKind, BackendSelector};
pub use error::ReaderError;
pub use reader::{extract_specs, TrajectoryReader, ENVIRONMENT_SPECS_KEY};
