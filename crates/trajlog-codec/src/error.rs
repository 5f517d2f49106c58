//! Error types for the binary and spec codecs.

use std::io;

use trajlog_core::BackendError;

/// Errors from the binary wire codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The file does not start with the expected `b"TRJL"` magic bytes.
    #[error("invalid magic bytes (expected b\"TRJL\")")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the file.
        found: u8,
    },
    /// The header names a different kind of file than the caller expected.
    #[error("unexpected file kind {found}, expected {expected}")]
    UnexpectedFileKind {
        /// Kind tag the caller asked for.
        expected: u8,
        /// Kind tag found in the header.
        found: u8,
    },
    /// A value type tag is not recognized.
    #[error("unknown value tag {tag}")]
    UnknownTag {
        /// The unrecognized tag.
        tag: u8,
    },
    /// A record could not be decoded (truncated or corrupt data).
    #[error("malformed record: {detail}")]
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// Values nest deeper than [`MAX_DEPTH`](crate::MAX_DEPTH).
    #[error("value nesting exceeds depth {limit}")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
    },
}

impl CodecError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}

impl From<CodecError> for BackendError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) => BackendError::Io(io),
            other => BackendError::Codec {
                detail: other.to_string(),
            },
        }
    }
}

/// Errors from decoding environment specs out of metadata.
///
/// Every variant carries the dotted path of the offending node,
/// e.g. `observation_spec.pixels.shape`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SpecCodecError {
    /// A node that must be a dictionary is something else.
    #[error("{path}: expected a dict, found {found}")]
    NotAMapping {
        /// Location of the node.
        path: String,
        /// Kind of value actually found.
        found: &'static str,
    },
    /// A required key is absent.
    #[error("{path}: missing required key '{key}'")]
    MissingKey {
        /// Location of the dictionary.
        path: String,
        /// The absent key.
        key: String,
    },
    /// A field is present but has the wrong type or an invalid value.
    #[error("{path}: {detail}")]
    InvalidField {
        /// Location of the field.
        path: String,
        /// What is wrong with it.
        detail: String,
    },
    /// A dtype name is not recognized.
    #[error("{path}: unknown dtype '{name}'")]
    UnknownDType {
        /// Location of the dtype field.
        path: String,
        /// The unrecognized name.
        name: String,
    },
    /// A dict spec uses a key the encoding reserves for array specs.
    #[error("{path}: key '{key}' is reserved and cannot name a child spec")]
    ReservedKey {
        /// Location of the dict spec.
        path: String,
        /// The reserved key.
        key: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_maps_to_backend_codec() {
        let err: BackendError = CodecError::UnknownTag { tag: 42 }.into();
        match err {
            BackendError::Codec { detail } => assert_eq!(detail, "unknown value tag 42"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn io_stays_io() {
        let err: BackendError =
            CodecError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")).into();
        assert!(matches!(err, BackendError::Io(_)));
    }

    #[test]
    fn spec_error_names_path() {
        let err = SpecCodecError::MissingKey {
            path: "environment_specs".into(),
            key: "action_spec".into(),
        };
        assert_eq!(
            err.to_string(),
            "environment_specs: missing required key 'action_spec'"
        );
    }
}
