//! The storage backend contract.

use crate::error::BackendError;
use crate::step::{EpisodeInfo, Step};
use crate::value::Value;

/// Step and episode counts observed together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrajectoryCounts {
    /// Total number of steps.
    pub num_steps: usize,
    /// Number of episodes.
    pub num_episodes: usize,
}

/// Read access to one logged trajectory, independent of how it is stored.
///
/// Implementors provide random access to steps and episode boundaries.
/// The lazy views in [`view`](crate::view) ([`Steps`](crate::Steps),
/// [`Episodes`](crate::Episodes), [`EpisodeMetadata`](crate::EpisodeMetadata))
/// are built on top of these primitives and never load the whole
/// trajectory at once.
///
/// # Consistency
///
/// `num_steps()` must equal the sum of `num_steps` over every episode
/// returned by `episode_info` while nothing is being appended. A backend
/// that allows a concurrent writer answers each call from the state at
/// that moment, so separate calls may straddle an append; use
/// [`counts`](Self::counts) for a pair taken from one snapshot.
///
/// # Threading
///
/// Backends are `Send` so a reader can be moved to a worker thread.
/// Nothing here requires `Sync`; concurrent calls into one backend are
/// only safe when the backend documents it.
pub trait BackendReader: Send {
    /// Backend-wide metadata recorded at write time, or `None`.
    ///
    /// An empty dictionary is equivalent to `None`.
    fn metadata(&self) -> Result<Option<Value>, BackendError>;

    /// Total number of steps across all episodes.
    fn num_steps(&self) -> usize;

    /// The step at global index `index`, in write order.
    fn step(&self, index: usize) -> Result<Step, BackendError>;

    /// Number of episodes.
    fn num_episodes(&self) -> usize;

    /// Boundaries of episode `index`; loads the episode metadata only
    /// when `include_metadata` is set.
    fn episode_info(&self, index: usize, include_metadata: bool)
        -> Result<EpisodeInfo, BackendError>;

    /// Both counts from one snapshot of the backend.
    ///
    /// Backends with a concurrent writer override this to read the two
    /// counts atomically.
    fn counts(&self) -> TrajectoryCounts {
        TrajectoryCounts {
            num_steps: self.num_steps(),
            num_episodes: self.num_episodes(),
        }
    }

    /// Release file handles and buffers.
    ///
    /// Idempotent: later calls have no effect. Never fails; problems
    /// during release are logged by the implementation.
    fn close(&mut self);

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;
}

impl<B: BackendReader + ?Sized> BackendReader for Box<B> {
    fn metadata(&self) -> Result<Option<Value>, BackendError> {
        (**self).metadata()
    }

    fn num_steps(&self) -> usize {
        (**self).num_steps()
    }

    fn step(&self, index: usize) -> Result<Step, BackendError> {
        (**self).step(index)
    }

    fn num_episodes(&self) -> usize {
        (**self).num_episodes()
    }

    fn episode_info(
        &self,
        index: usize,
        include_metadata: bool,
    ) -> Result<EpisodeInfo, BackendError> {
        (**self).episode_info(index, include_metadata)
    }

    fn counts(&self) -> TrajectoryCounts {
        (**self).counts()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
