//! Core types and traits for trajlog.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the value model shared by every storage backend, the step and spec
//! descriptors, the [`BackendReader`] contract and the lazy views built
//! on top of it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod dtype;
pub mod error;
pub mod spec;
pub mod step;
pub mod traits;
pub mod value;
pub mod view;

pub use dtype::DType;
pub use error::BackendError;
pub use spec::{ArraySpec, Bounds, EnvironmentSpecs, Shape, Spec};
pub use step::{EpisodeInfo, Step, StepType};
pub use traits::{BackendReader, TrajectoryCounts};
pub use value::{Tensor, Value};
pub use view::{Episode, EpisodeIter, EpisodeMetadata, Episodes, StepIter, Steps};
