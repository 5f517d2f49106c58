//! Errors reported by storage backends.

use std::io;
use std::path::PathBuf;

/// Errors a [`BackendReader`](crate::BackendReader) can raise, either while
/// it is being constructed or while data is read through it.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// An I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Stored bytes could not be decoded.
    #[error("decode error: {detail}")]
    Codec {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A required file or directory does not exist or holds no data.
    #[error("not found: {}: {detail}", path.display())]
    NotFound {
        /// The missing or empty path.
        path: PathBuf,
        /// What was expected there.
        detail: String,
    },
    /// Indexes disagree with the data they point into.
    #[error("corrupt storage: {detail}")]
    Corrupt {
        /// Human-readable description of the inconsistency.
        detail: String,
    },
    /// A step or episode index is past the end of the sequence.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The sequence length at the time of the request.
        len: usize,
    },
    /// The backend was closed before the call.
    #[error("backend is closed")]
    Closed,
    /// A constructor argument is missing or has the wrong type.
    #[error("invalid backend argument: {detail}")]
    InvalidArgument {
        /// Which argument and why it was rejected.
        detail: String,
    },
    /// A lock guarding shared storage was poisoned by a panicking thread.
    #[error("backend storage lock poisoned")]
    Poisoned,
}

impl BackendError {
    /// Shorthand for [`BackendError::InvalidArgument`].
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            detail: detail.into(),
        }
    }

    /// Shorthand for [`BackendError::Corrupt`].
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt {
            detail: detail.into(),
        }
    }
}
