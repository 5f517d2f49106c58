//! Test fixtures and mock types for trajlog development.
//!
//! Provides [`MockBackend`], a vector-backed [`BackendReader`] that counts
//! how often it is closed, and deterministic trajectories in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trajlog_core::{BackendError, BackendReader, EpisodeInfo, Step, Value};

/// Shared counter observing how often a [`MockBackend`] was closed.
///
/// Clone it before handing the backend away; the clone keeps counting
/// after the backend is moved into a reader or dropped.
#[derive(Clone, Debug, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-process [`BackendReader`] over a fixed list of episodes.
///
/// Every call to [`close`](BackendReader::close) bumps the shared
/// [`CloseCounter`], including repeated calls, so tests can tell whether
/// a caller honours idempotence on its own side.
#[derive(Debug)]
pub struct MockBackend {
    metadata: Option<Value>,
    steps: Vec<Step>,
    episodes: Vec<EpisodeInfo>,
    closed: bool,
    closes: CloseCounter,
    fail_metadata: bool,
}

impl MockBackend {
    /// Backend holding `episodes` in order, with backend metadata.
    pub fn new(metadata: Option<Value>, episodes: Vec<Vec<Step>>) -> Self {
        let mut steps = Vec::new();
        let mut infos = Vec::new();
        for (i, episode) in episodes.into_iter().enumerate() {
            infos.push(EpisodeInfo {
                start: steps.len(),
                num_steps: episode.len(),
                metadata: Some(episode_metadata(i)),
            });
            steps.extend(episode);
        }
        Self {
            metadata,
            steps,
            episodes: infos,
            closed: false,
            closes: CloseCounter::default(),
            fail_metadata: false,
        }
    }

    /// The reference scenario: episodes of [`REFERENCE_EPISODES`] lengths.
    pub fn reference(metadata: Option<Value>) -> Self {
        let episodes = REFERENCE_EPISODES
            .iter()
            .enumerate()
            .map(|(i, &len)| catch_episode(i, len))
            .collect();
        Self::new(metadata, episodes)
    }

    /// Make [`metadata`](BackendReader::metadata) fail with
    /// [`BackendError::Corrupt`].
    pub fn failing_metadata(mut self) -> Self {
        self.fail_metadata = true;
        self
    }

    pub fn close_counter(&self) -> CloseCounter {
        self.closes.clone()
    }
}

impl BackendReader for MockBackend {
    fn metadata(&self) -> Result<Option<Value>, BackendError> {
        if self.fail_metadata {
            return Err(BackendError::corrupt("mock metadata failure"));
        }
        Ok(self.metadata.clone())
    }

    fn num_steps(&self) -> usize {
        self.steps.len()
    }

    fn step(&self, index: usize) -> Result<Step, BackendError> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        self.steps
            .get(index)
            .cloned()
            .ok_or(BackendError::IndexOutOfRange {
                index,
                len: self.steps.len(),
            })
    }

    fn num_episodes(&self) -> usize {
        self.episodes.len()
    }

    fn episode_info(&self, index: usize, include_metadata: bool) -> Result<EpisodeInfo, BackendError> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        let mut info = self
            .episodes
            .get(index)
            .cloned()
            .ok_or(BackendError::IndexOutOfRange {
                index,
                len: self.episodes.len(),
            })?;
        if !include_metadata {
            info.metadata = None;
        }
        Ok(info)
    }

    fn close(&mut self) {
        self.closes.0.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
