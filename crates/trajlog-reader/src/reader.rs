//! The [`TrajectoryReader`] facade.

use std::fmt;

use tracing::{debug, info, warn};
use trajlog_codec::decode_environment_specs;
use trajlog_core::{
    BackendError, BackendReader, EnvironmentSpecs, EpisodeInfo, EpisodeMetadata, Episodes, Spec,
    Step, Steps, Value,
};

use crate::backend::{BackendArgs, BackendKind, BackendSelector};
use crate::error::ReaderError;

/// Metadata key holding the encoded environment specs.
pub const ENVIRONMENT_SPECS_KEY: &str = "environment_specs";

/// Reads a logged trajectory through any storage backend.
///
/// Construction selects or accepts a backend and decodes the environment
/// specs recorded in its metadata once; the spec accessors never touch
/// storage afterwards. Steps and episodes are served lazily by the
/// backend.
///
/// The reader owns its backend and closes it exactly once.
/// [`close`](Self::close) releases it early and may be called any number
/// of times; dropping the reader closes it if that has not happened yet.
///
/// # Examples
///
/// ```
/// use trajlog_core::{ArraySpec, DType, EnvironmentSpecs, Step, StepType, Value};
/// use trajlog_memory::{InMemoryBackendWriter, InMemoryStorage};
/// use trajlog_reader::{BackendArgs, BackendKind, TrajectoryReader};
///
/// let specs = EnvironmentSpecs {
///     observation_spec: ArraySpec::scalar(DType::Int32).into(),
///     ..Default::default()
/// };
/// let metadata = Value::dict([(
///     "environment_specs",
///     trajlog_codec::encode_environment_specs(&specs).unwrap(),
/// )]);
///
/// let storage = InMemoryStorage::new();
/// let mut writer = InMemoryBackendWriter::new(storage.clone(), Some(metadata));
/// writer.add_step(Step::new(StepType::First, Value::from(7)), true);
///
/// let reader = TrajectoryReader::open(
///     BackendKind::InMemory,
///     BackendArgs::new().arg(storage),
/// )
/// .unwrap();
/// assert_eq!(reader.steps().len(), 1);
/// assert_eq!(reader.observation_spec(), &specs.observation_spec);
/// ```
pub struct TrajectoryReader {
    backend: Box<dyn BackendReader>,
    specs: EnvironmentSpecs,
    closed: bool,
}

impl TrajectoryReader {
    /// Construct a reader over the backend `selector` names.
    ///
    /// `args` go to the backend constructor unchanged; they are ignored
    /// when the selector already holds a backend. On failure after the
    /// backend exists, the backend is closed before the error returns.
    pub fn new(
        selector: impl Into<BackendSelector>,
        args: BackendArgs,
    ) -> Result<Self, ReaderError> {
        let selector = selector.into();
        info!(backend = ?selector, "opening trajectory reader");
        info!(?args, "backend arguments");
        let backend = match selector {
            BackendSelector::Instance(backend) => {
                if !args.is_empty() {
                    warn!("backend arguments ignored for a ready backend");
                }
                backend
            }
            BackendSelector::Kind(kind) => kind.factory()(args)?,
            BackendSelector::Named(name) => name.parse::<BackendKind>()?.factory()(args)?,
        };
        Self::with_backend(backend)
    }

    /// Construct a backend of `kind` from `args` and read from it.
    pub fn open(kind: BackendKind, args: BackendArgs) -> Result<Self, ReaderError> {
        Self::new(kind, args)
    }

    /// Read from a backend constructed by the caller.
    pub fn from_backend(backend: impl BackendReader + 'static) -> Result<Self, ReaderError> {
        Self::with_backend(Box::new(backend))
    }

    fn with_backend(mut backend: Box<dyn BackendReader>) -> Result<Self, ReaderError> {
        match extract_specs(backend.as_ref()) {
            Ok(specs) => Ok(Self {
                backend,
                specs,
                closed: false,
            }),
            Err(e) => {
                debug!(error = %e, "closing backend after failed construction");
                backend.close();
                Err(e)
            }
        }
    }

    /// Backend-wide metadata, or `None`.
    pub fn metadata(&self) -> Result<Option<Value>, BackendError> {
        self.backend.metadata()
    }

    /// Every step, in write order.
    pub fn steps(&self) -> Steps<'_> {
        Steps::new(self.backend.as_ref())
    }

    /// Every episode, in write order.
    pub fn episodes(&self) -> Episodes<'_> {
        Episodes::new(self.backend.as_ref())
    }

    /// Per-episode metadata, parallel to [`episodes`](Self::episodes).
    pub fn episode_metadata(&self) -> EpisodeMetadata<'_> {
        EpisodeMetadata::new(self.backend.as_ref())
    }

    /// Spec of the observations.
    pub fn observation_spec(&self) -> &Spec {
        &self.specs.observation_spec
    }

    /// Spec of the actions.
    pub fn action_spec(&self) -> &Spec {
        &self.specs.action_spec
    }

    /// Spec of the rewards.
    pub fn reward_spec(&self) -> &Spec {
        &self.specs.reward_spec
    }

    /// Spec of the discounts.
    pub fn discount_spec(&self) -> &Spec {
        &self.specs.discount_spec
    }

    /// All four specs.
    pub fn environment_specs(&self) -> &EnvironmentSpecs {
        &self.specs
    }

    /// The backend being read.
    pub fn backend(&self) -> &dyn BackendReader {
        self.backend.as_ref()
    }

    /// Release the backend's resources.
    ///
    /// Only the first call reaches the backend; later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.backend.close();
    }

    /// Whether the reader or the backend itself has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed || self.backend.is_closed()
    }

    /// Give the backend back without closing it.
    pub fn into_backend(mut self) -> Box<dyn BackendReader> {
        self.closed = true;
        std::mem::replace(&mut self.backend, Box::new(Detached))
    }
}

impl Drop for TrajectoryReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for TrajectoryReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.backend.counts();
        f.debug_struct("TrajectoryReader")
            .field("num_steps", &counts.num_steps)
            .field("num_episodes", &counts.num_episodes)
            .field("closed", &self.is_closed())
            .field("specs", &self.specs)
            .finish()
    }
}

/// Decode the environment specs recorded in a backend's metadata.
///
/// Absent metadata counts as an empty dictionary. A dictionary without
/// an `environment_specs` entry yields [`ReaderError::SpecsNotRecorded`].
pub fn extract_specs(backend: &dyn BackendReader) -> Result<EnvironmentSpecs, ReaderError> {
    let metadata = backend.metadata()?;
    let Some(metadata) = metadata.filter(|m| !m.is_absent()) else {
        return Err(ReaderError::SpecsNotRecorded);
    };
    if metadata.as_dict().is_none() {
        return Err(trajlog_codec::SpecCodecError::NotAMapping {
            path: "metadata".into(),
            found: metadata.kind(),
        }
        .into());
    }
    let encoded = metadata
        .get(ENVIRONMENT_SPECS_KEY)
        .ok_or(ReaderError::SpecsNotRecorded)?;
    Ok(decode_environment_specs(encoded)?)
}

/// Stand-in left behind by [`TrajectoryReader::into_backend`].
struct Detached;

impl BackendReader for Detached {
    fn metadata(&self) -> Result<Option<Value>, BackendError> {
        Ok(None)
    }

    fn num_steps(&self) -> usize {
        0
    }

    fn step(&self, _index: usize) -> Result<Step, BackendError> {
        Err(BackendError::Closed)
    }

    fn num_episodes(&self) -> usize {
        0
    }

    fn episode_info(&self, _index: usize, _include_metadata: bool) -> Result<EpisodeInfo, BackendError> {
        Err(BackendError::Closed)
    }

    fn close(&mut self) {}

    fn is_closed(&self) -> bool {
        true
    }
}
