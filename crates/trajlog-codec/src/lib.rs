//! Encoding of trajlog values, steps and environment specs.
//!
//! Two codecs live here:
//!
//! - [`wire`]: a compact binary encoding of [`Value`](trajlog_core::Value)
//!   trees and [`Step`](trajlog_core::Step) records, plus the file header
//!   shared by every file of the binary log.
//! - [`spec_codec`]: conversion between
//!   [`EnvironmentSpecs`](trajlog_core::EnvironmentSpecs) and the value
//!   form stored under the `environment_specs` metadata key.
//!
//! # Wire format
//!
//! ```text
//! file   := [MAGIC "TRJL"] [VERSION u8] [FileKind u8] payload
//! value  := [tag u8] body
//! step   := [step_type u8] observation reward discount action custom_data
//! ```
//!
//! All integers are little-endian; strings, byte arrays, lists and dicts
//! are prefixed with a `u32` length.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod spec_codec;
pub mod wire;

pub use error::{CodecError, SpecCodecError};
pub use spec_codec::{decode_environment_specs, decode_spec, encode_environment_specs, encode_spec};
pub use wire::FileKind;

/// Magic bytes at the start of every binary log file.
pub const MAGIC: [u8; 4] = *b"TRJL";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

/// Deepest value nesting accepted by the decoder.
pub const MAX_DEPTH: usize = 64;
