//! [`BackendReader`] over an [`InMemoryStorage`].

use tracing::debug;
use trajlog_core::{BackendError, BackendReader, EpisodeInfo, Step, TrajectoryCounts, Value};

use crate::storage::InMemoryStorage;

/// Reads the trajectory held by an [`InMemoryStorage`].
///
/// Metadata is copied at construction and stays readable after
/// [`close`](BackendReader::close). Steps and episodes are read live, so
/// a writer sharing the storage may keep appending. Separate count calls
/// may straddle an append; [`counts`](BackendReader::counts) reads both
/// under one lock. Counts drop to zero once the reader is closed.
#[derive(Debug)]
pub struct InMemoryBackendReader {
    storage: Option<InMemoryStorage>,
    metadata: Option<Value>,
}

impl InMemoryBackendReader {
    /// Read from `storage`.
    pub fn new(storage: InMemoryStorage) -> Self {
        let metadata = storage.read().metadata.clone();
        Self {
            storage: Some(storage),
            metadata,
        }
    }

    fn storage(&self) -> Result<&InMemoryStorage, BackendError> {
        self.storage.as_ref().ok_or(BackendError::Closed)
    }
}

impl BackendReader for InMemoryBackendReader {
    fn metadata(&self) -> Result<Option<Value>, BackendError> {
        Ok(self.metadata.clone())
    }

    fn num_steps(&self) -> usize {
        self.storage.as_ref().map_or(0, InMemoryStorage::num_steps)
    }

    fn step(&self, index: usize) -> Result<Step, BackendError> {
        let inner = self.storage()?.read();
        inner
            .steps
            .get(index)
            .cloned()
            .ok_or(BackendError::IndexOutOfRange {
                index,
                len: inner.steps.len(),
            })
    }

    fn num_episodes(&self) -> usize {
        self.storage.as_ref().map_or(0, InMemoryStorage::num_episodes)
    }

    fn episode_info(&self, index: usize, include_metadata: bool) -> Result<EpisodeInfo, BackendError> {
        self.storage()?.read().episode_info(index, include_metadata)
    }

    fn counts(&self) -> TrajectoryCounts {
        self.storage
            .as_ref()
            .map_or_else(TrajectoryCounts::default, InMemoryStorage::counts)
    }

    fn close(&mut self) {
        if self.storage.take().is_some() {
            debug!("closed in-memory backend");
        }
    }

    fn is_closed(&self) -> bool {
        self.storage.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackendWriter;
    use std::thread;
    use trajlog_core::{Episodes, Steps};
    use trajlog_test_utils::{
        catch_episode, catch_specs, coordinates, metadata_with_specs, REFERENCE_EPISODES,
    };

    fn reference_storage() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        let mut w =
            InMemoryBackendWriter::new(storage.clone(), Some(metadata_with_specs(&catch_specs())));
        for (e, &len) in REFERENCE_EPISODES.iter().enumerate() {
            for (i, step) in catch_episode(e, len).into_iter().enumerate() {
                w.add_step(step, i == 0);
            }
        }
        storage
    }

    #[test]
    fn reads_reference_scenario() {
        let reader = InMemoryBackendReader::new(reference_storage());
        let steps = Steps::new(&reader);
        let episodes = Episodes::new(&reader);
        assert_eq!(steps.len(), 8);
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes.get(1).unwrap().start(), 3);
        assert_eq!(coordinates(&steps.get(4).unwrap()), Some((1, 1)));
    }

    #[test]
    fn close_keeps_metadata_only() {
        let mut reader = InMemoryBackendReader::new(reference_storage());
        reader.close();
        reader.close();
        assert!(reader.is_closed());
        assert_eq!(
            reader.metadata().unwrap(),
            Some(metadata_with_specs(&catch_specs()))
        );
        assert_eq!(reader.num_steps(), 0);
        assert_eq!(reader.counts(), TrajectoryCounts::default());
        assert!(matches!(reader.step(0), Err(BackendError::Closed)));
        assert!(matches!(reader.episode_info(0, true), Err(BackendError::Closed)));
    }

    #[test]
    fn metadata_is_a_snapshot() {
        let storage = reference_storage();
        let reader = InMemoryBackendReader::new(storage.clone());
        let _ = InMemoryBackendWriter::new(storage, None);
        assert!(reader.metadata().unwrap().is_some());
    }

    #[test]
    fn sees_steps_appended_later() {
        let storage = InMemoryStorage::new();
        let reader = InMemoryBackendReader::new(storage.clone());
        assert_eq!(reader.num_steps(), 0);
        let mut w = InMemoryBackendWriter::new(storage, None);
        w.add_step(catch_episode(0, 1).remove(0), true);
        assert_eq!(reader.num_steps(), 1);
        assert_eq!(reader.num_episodes(), 1);
    }

    #[test]
    fn counts_snapshot_under_concurrent_writer() {
        const LEN: usize = 3;
        let storage = InMemoryStorage::new();
        let reader = InMemoryBackendReader::new(storage.clone());
        let writer = thread::spawn(move || {
            let mut w = InMemoryBackendWriter::new(storage, None);
            for e in 0..200 {
                for (i, step) in catch_episode(e, LEN).into_iter().enumerate() {
                    w.add_step(step, i == 0);
                }
            }
        });
        while !writer.is_finished() {
            let c = reader.counts();
            // Only the newest episode may be partly written.
            if c.num_episodes > 0 {
                assert!(c.num_steps > (c.num_episodes - 1) * LEN);
            }
            assert!(c.num_steps <= c.num_episodes * LEN);
        }
        writer.join().unwrap();
        assert_eq!(
            reader.counts(),
            TrajectoryCounts {
                num_steps: 600,
                num_episodes: 200
            }
        );
    }

    #[test]
    fn episode_sum_trails_live_step_count() {
        let storage = InMemoryStorage::new();
        let reader = InMemoryBackendReader::new(storage.clone());
        let writer = thread::spawn(move || {
            let mut w = InMemoryBackendWriter::new(storage, None);
            for e in 0..50 {
                for (i, step) in catch_episode(e, 1 + e % 4).into_iter().enumerate() {
                    w.add_step(step, i == 0);
                }
            }
        });
        while !writer.is_finished() {
            let episodes = reader.num_episodes();
            let total: usize = (0..episodes)
                .map(|e| reader.episode_info(e, false).unwrap().num_steps)
                .sum();
            // Steps appended between the two reads land in the last episode.
            assert!(total <= reader.num_steps());
        }
        writer.join().unwrap();
        let episodes = reader.num_episodes();
        let total: usize = (0..episodes)
            .map(|e| reader.episode_info(e, false).unwrap().num_steps)
            .sum();
        assert_eq!(total, reader.num_steps());
    }
}
