//! Shared in-memory storage and its writer.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use trajlog_core::{BackendError, EpisodeInfo, Step, TrajectoryCounts, Value};

#[derive(Debug, Default)]
pub(crate) struct StorageInner {
    pub(crate) metadata: Option<Value>,
    pub(crate) steps: Vec<Step>,
    /// Global index of each episode's first step, ascending.
    pub(crate) episode_starts: Vec<usize>,
    pub(crate) episode_metadata: Vec<Option<Value>>,
}

impl StorageInner {
    /// Episode boundaries, read under the caller's lock so the last
    /// episode's length agrees with `steps.len()`.
    pub(crate) fn episode_info(&self, index: usize, include_metadata: bool) -> Result<EpisodeInfo, BackendError> {
        let start = *self
            .episode_starts
            .get(index)
            .ok_or(BackendError::IndexOutOfRange {
                index,
                len: self.episode_starts.len(),
            })?;
        let end = self
            .episode_starts
            .get(index + 1)
            .copied()
            .unwrap_or(self.steps.len());
        let metadata = if include_metadata {
            self.episode_metadata.get(index).cloned().flatten()
        } else {
            None
        };
        Ok(EpisodeInfo {
            start,
            num_steps: end - start,
            metadata,
        })
    }
}

/// Cloneable handle to one trajectory held in memory.
///
/// Clones share the same data. `Debug` prints the counts only.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<StorageInner>>,
}

impl InMemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps stored so far.
    pub fn num_steps(&self) -> usize {
        self.read().steps.len()
    }

    /// Episodes started so far.
    pub fn num_episodes(&self) -> usize {
        self.read().episode_starts.len()
    }

    /// Steps and episodes, read under one lock.
    pub fn counts(&self) -> TrajectoryCounts {
        let inner = self.read();
        TrajectoryCounts {
            num_steps: inner.steps.len(),
            num_episodes: inner.episode_starts.len(),
        }
    }

    /// Readers keep working after a panicking writer: every mutation
    /// leaves the vectors consistent before it can panic.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StorageInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StorageInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("InMemoryStorage");
        // A writer on this thread may hold the lock while logging.
        let inner = match self.inner.try_read() {
            Ok(inner) => inner,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return d.finish_non_exhaustive(),
        };
        d.field("num_steps", &inner.steps.len())
            .field("num_episodes", &inner.episode_starts.len())
            .finish()
    }
}

/// Appends steps to an [`InMemoryStorage`].
///
/// # Examples
///
/// ```
/// use trajlog_core::{BackendReader, Step, StepType, Value};
/// use trajlog_memory::{InMemoryBackendReader, InMemoryBackendWriter, InMemoryStorage};
///
/// let storage = InMemoryStorage::new();
/// let mut writer = InMemoryBackendWriter::new(storage.clone(), None);
/// writer.add_step(Step::new(StepType::First, Value::from(0)), true);
/// writer.add_step(Step::new(StepType::Last, Value::from(1)), false);
///
/// let reader = InMemoryBackendReader::new(storage);
/// assert_eq!(reader.num_steps(), 2);
/// assert_eq!(reader.num_episodes(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryBackendWriter {
    storage: InMemoryStorage,
}

impl InMemoryBackendWriter {
    /// Wrap `storage`, replacing its backend metadata with `metadata`.
    pub fn new(storage: InMemoryStorage, metadata: Option<Value>) -> Self {
        storage.write().metadata = metadata;
        Self { storage }
    }

    /// Append a step, starting a new episode when `new_episode` is set
    /// or when the storage holds no episode yet.
    pub fn add_step(&mut self, step: Step, new_episode: bool) {
        let mut inner = self.storage.write();
        if new_episode || inner.episode_starts.is_empty() {
            let start = inner.steps.len();
            inner.episode_starts.push(start);
            inner.episode_metadata.push(None);
        }
        inner.steps.push(step);
    }

    /// Attach metadata to the latest episode, replacing any set before.
    pub fn set_episode_metadata(&mut self, metadata: Value) -> Result<(), BackendError> {
        let mut inner = self.storage.write();
        match inner.episode_metadata.last_mut() {
            Some(slot) => {
                *slot = Some(metadata);
                Ok(())
            }
            None => Err(BackendError::invalid_argument(
                "episode metadata set before the first step",
            )),
        }
    }

    /// The storage this writer appends to.
    pub fn storage(&self) -> &InMemoryStorage {
        &self.storage
    }
}
