//! In-memory trajectory storage for trajlog.
//!
//! [`InMemoryStorage`] is a shared handle: an [`InMemoryBackendWriter`]
//! appends through one clone while any number of
//! [`InMemoryBackendReader`]s read through others. Readers see appended
//! steps immediately.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod reader;
pub mod storage;

pub use reader::InMemoryBackendReader;
pub use storage::{InMemoryBackendWriter, InMemoryStorage};
