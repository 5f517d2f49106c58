//! Sharded append-only binary log for trajlog.
//!
//! A log is a directory: an optional `metadata.trjl` for the whole
//! trajectory, and one `shard-NNNNNN/` sub-directory per group of
//! episodes. Episodes never span shards.
//!
//! ```text
//! <data_dir>/metadata.trjl
//! <data_dir>/shard-000000/steps.trjl             [u32 len][step]*
//!                        /step_offsets.trjl      u64*
//!                        /episode_index.trjl     (u64 start, u64 len, u64 metadata offset)*
//!                        /episode_metadata.trjl  [u32 len][value]*
//! ```
//!
//! Every file starts with the header described in
//! [`trajlog_codec::wire`]. A metadata offset of `0` means the episode
//! has no metadata; real offsets are never smaller than the header.
//!
//! [`LogWriter`] produces logs; [`LogBackendReader`] implements
//! [`BackendReader`](trajlog_core::BackendReader) over them.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod layout;
pub mod reader;
mod shard;
pub mod writer;

pub use config::{ConfigError, LogReaderConfig, LogWriterConfig};
pub use reader::LogBackendReader;
pub use writer::LogWriter;
