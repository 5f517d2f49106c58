//! Writer and reader configuration for the binary log.

use trajlog_core::BackendError;

// ── LogWriterConfig ────────────────────────────────────────────────

/// Configuration for [`LogWriter`](crate::LogWriter).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogWriterConfig {
    /// Start a new shard after this many episodes. `None` writes a single
    /// shard. Episodes never span shards.
    pub max_episodes_per_shard: Option<u64>,
    /// Flush the steps file after every step so concurrent readers see
    /// new steps without waiting for the episode to finish.
    pub flush_every_step: bool,
}

impl LogWriterConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_episodes_per_shard == Some(0) {
            return Err(ConfigError::ZeroEpisodesPerShard);
        }
        Ok(())
    }
}

// ── LogReaderConfig ────────────────────────────────────────────────

/// Configuration for [`LogBackendReader`](crate::LogBackendReader).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogReaderConfig {
    /// Skip shards that hold no steps (a writer killed before its first
    /// flush leaves one behind) instead of failing the open.
    pub tolerate_truncated_shards: bool,
}

impl Default for LogReaderConfig {
    fn default() -> Self {
        Self {
            tolerate_truncated_shards: true,
        }
    }
}

impl LogReaderConfig {
    /// Check structural invariants. Every combination is currently valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating or assembling a log configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `max_episodes_per_shard` was `Some(0)`.
    #[error("max_episodes_per_shard must be at least 1")]
    ZeroEpisodesPerShard,
    /// A named option was given a value of the wrong type.
    #[error("option '{name}' expects {expected}")]
    InvalidOption {
        /// Option name.
        name: String,
        /// Description of the accepted values.
        expected: &'static str,
    },
}

impl From<ConfigError> for BackendError {
    fn from(e: ConfigError) -> Self {
        BackendError::InvalidArgument {
            detail: e.to_string(),
        }
    }
}
