//! Errors raised while constructing a [`TrajectoryReader`](crate::TrajectoryReader).

use trajlog_codec::SpecCodecError;
use trajlog_core::BackendError;

/// Why a reader could not be constructed.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The backend selector names no known backend kind.
    #[error("unsupported backend: '{value}'")]
    Configuration {
        /// The rejected selector, as given.
        value: String,
    },
    /// The backend failed to construct or to report its metadata.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The recorded environment specs are malformed.
    #[error("cannot decode environment specs: {0}")]
    MetadataDecode(#[from] SpecCodecError),
    /// The metadata carries no `environment_specs` entry.
    #[error("metadata does not record environment specs")]
    SpecsNotRecorded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_are_transparent() {
        let err: ReaderError = BackendError::Closed.into();
        assert_eq!(err.to_string(), BackendError::Closed.to_string());
    }

    #[test]
    fn configuration_names_value() {
        let err = ReaderError::Configuration {
            value: "sqlite".into(),
        };
        assert_eq!(err.to_string(), "unsupported backend: 'sqlite'");
    }
}
