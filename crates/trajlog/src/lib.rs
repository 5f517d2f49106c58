//! trajlog: read and write logged reinforcement-learning trajectories.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all trajlog sub-crates. For most users, adding `trajlog` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use trajlog::prelude::*;
//!
//! let specs = EnvironmentSpecs {
//!     observation_spec: ArraySpec::new(&[2], DType::Float32).into(),
//!     action_spec: ArraySpec::discrete(4, DType::Int64).into(),
//!     reward_spec: ArraySpec::scalar(DType::Float64).into(),
//!     discount_spec: ArraySpec::scalar(DType::Float64).bounded(0.0, 1.0).into(),
//! };
//! let metadata = Value::dict([("environment_specs", encode_environment_specs(&specs).unwrap())]);
//!
//! // Write one three-step episode.
//! let dir = tempfile::tempdir().unwrap();
//! let mut writer = LogWriter::create(dir.path(), Some(&metadata), LogWriterConfig::default()).unwrap();
//! for i in 0..3 {
//!     let obs = Tensor::from_slice(&[2], &[i as f32, 0.0]).unwrap();
//!     let step = Step::new(StepType::Mid, Value::Tensor(obs)).with_action(1i64);
//!     writer.add_step(&step, i == 0).unwrap();
//! }
//! writer.close().unwrap();
//!
//! // Read it back through the facade.
//! let reader = TrajectoryReader::new("log", BackendArgs::new().arg(dir.path())).unwrap();
//! assert_eq!(reader.steps().len(), 3);
//! assert_eq!(reader.episodes().len(), 1);
//! assert_eq!(reader.environment_specs(), &specs);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `trajlog-core` | Values, steps, specs, `BackendReader`, lazy views |
//! | [`codec`] | `trajlog-codec` | Binary wire codec and environment spec codec |
//! | [`log`] | `trajlog-log` | Sharded binary log writer and backend reader |
//! | [`memory`] | `trajlog-memory` | In-memory storage, writer and backend reader |
//! | [`reader`] | `trajlog-reader` | Backend dispatch and `TrajectoryReader` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits and views (`trajlog-core`).
pub use trajlog_core as types;

/// Wire and spec codecs (`trajlog-codec`).
pub use trajlog_codec as codec;

/// Sharded binary log (`trajlog-log`).
///
/// Write with [`log::LogWriter`], read with [`log::LogBackendReader`].
pub use trajlog_log as log;

/// In-memory storage (`trajlog-memory`).
pub use trajlog_memory as memory;

/// Backend dispatch and the reader facade (`trajlog-reader`).
pub use trajlog_reader as reader;

/// Common imports for typical trajlog usage.
pub mod prelude {
    // Core types and traits
    pub use trajlog_core::{
        ArraySpec, BackendError, BackendReader, Bounds, DType, EnvironmentSpecs, EpisodeInfo,
        Spec, Step, StepType, Tensor, TrajectoryCounts, Value,
    };

    // Views
    pub use trajlog_core::{Episode, EpisodeMetadata, Episodes, Steps};

    // Codecs
    pub use trajlog_codec::{decode_environment_specs, encode_environment_specs, SpecCodecError};

    // Backends
    pub use trajlog_log::{LogBackendReader, LogReaderConfig, LogWriter, LogWriterConfig};
    pub use trajlog_memory::{InMemoryBackendReader, InMemoryBackendWriter, InMemoryStorage};

    // Reader
    pub use trajlog_reader::{
        BackendArgs, BackendKind, BackendSelector, ReaderError, TrajectoryReader,
    };
}
