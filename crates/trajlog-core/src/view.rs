//! Lazy, indexable views over a [`BackendReader`].
//!
//! Views borrow the backend and read through it on every access; they
//! hold no step data of their own. Lengths are taken from the backend
//! at the moment of the call, so a view over a log that is still being
//! written sees the steps appended since it was created.

use std::fmt;

use crate::error::BackendError;
use crate::step::{EpisodeInfo, Step};
use crate::traits::BackendReader;
use crate::value::Value;

/// Closed backends report `Closed` even for indices past their length.
fn check_access(backend: &dyn BackendReader, index: usize, len: usize) -> Result<(), BackendError> {
    if backend.is_closed() {
        return Err(BackendError::Closed);
    }
    check_index(index, len)
}

fn check_index(index: usize, len: usize) -> Result<(), BackendError> {
    if index >= len {
        return Err(BackendError::IndexOutOfRange { index, len });
    }
    Ok(())
}

/// Every step of the trajectory, in write order.
///
/// # Examples
///
/// ```
/// # use trajlog_core::{BackendReader, BackendError, EpisodeInfo, Step, StepType, Steps, Value};
/// # struct Two;
/// # impl BackendReader for Two {
/// #     fn metadata(&self) -> Result<Option<Value>, BackendError> { Ok(None) }
/// #     fn num_steps(&self) -> usize { 2 }
/// #     fn step(&self, i: usize) -> Result<Step, BackendError> {
/// #         Ok(Step::new(StepType::Mid, Value::Int(i as i64)))
/// #     }
/// #     fn num_episodes(&self) -> usize { 1 }
/// #     fn episode_info(&self, _: usize, _: bool) -> Result<EpisodeInfo, BackendError> {
/// #         Ok(EpisodeInfo { start: 0, num_steps: 2, metadata: None })
/// #     }
/// #     fn close(&mut self) {}
/// #     fn is_closed(&self) -> bool { false }
/// # }
/// let backend = Two;
/// let steps = Steps::new(&backend);
/// assert_eq!(steps.len(), 2);
/// assert_eq!(steps.get(1).unwrap().observation, Value::Int(1));
/// assert!(steps.get(2).is_err());
/// ```
#[derive(Clone, Copy)]
pub struct Steps<'a> {
    backend: &'a dyn BackendReader,
}

impl<'a> Steps<'a> {
    /// View the steps of `backend`.
    pub fn new(backend: &'a dyn BackendReader) -> Self {
        Self { backend }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.backend.num_steps()
    }

    /// Whether the trajectory holds no steps.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The step at `index`.
    pub fn get(&self, index: usize) -> Result<Step, BackendError> {
        check_access(self.backend, index, self.len())?;
        self.backend.step(index)
    }

    /// Iterate over all steps, reading each one on demand.
    pub fn iter(&self) -> StepIter<'a> {
        StepIter {
            backend: self.backend,
            next: 0,
            end: self.len(),
        }
    }
}

impl fmt::Debug for Steps<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Steps").field("len", &self.len()).finish()
    }
}

impl<'a> IntoIterator for Steps<'a> {
    type Item = Result<Step, BackendError>;
    type IntoIter = StepIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a contiguous range of global step indices.
pub struct StepIter<'a> {
    backend: &'a dyn BackendReader,
    next: usize,
    end: usize,
}

impl Iterator for StepIter<'_> {
    type Item = Result<Step, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.backend.step(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StepIter<'_> {}

/// The trajectory grouped into episodes.
#[derive(Clone, Copy)]
pub struct Episodes<'a> {
    backend: &'a dyn BackendReader,
}

impl<'a> Episodes<'a> {
    /// View the episodes of `backend`.
    pub fn new(backend: &'a dyn BackendReader) -> Self {
        Self { backend }
    }

    /// Number of episodes.
    pub fn len(&self) -> usize {
        self.backend.num_episodes()
    }

    /// Whether the trajectory holds no episodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Episode `index` as a step view.
    pub fn get(&self, index: usize) -> Result<Episode<'a>, BackendError> {
        check_access(self.backend, index, self.len())?;
        let info = self.backend.episode_info(index, false)?;
        Ok(Episode {
            backend: self.backend,
            index,
            info,
        })
    }

    /// Iterate over all episodes.
    pub fn iter(&self) -> EpisodeIter<'a> {
        EpisodeIter {
            episodes: *self,
            next: 0,
            end: self.len(),
        }
    }
}

impl fmt::Debug for Episodes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Episodes").field("len", &self.len()).finish()
    }
}

impl<'a> IntoIterator for Episodes<'a> {
    type Item = Result<Episode<'a>, BackendError>;
    type IntoIter = EpisodeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over [`Episodes`].
pub struct EpisodeIter<'a> {
    episodes: Episodes<'a>,
    next: usize,
    end: usize,
}

impl<'a> Iterator for EpisodeIter<'a> {
    type Item = Result<Episode<'a>, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.episodes.get(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EpisodeIter<'_> {}

/// The steps of a single episode. Indices are local to the episode.
#[derive(Clone)]
pub struct Episode<'a> {
    backend: &'a dyn BackendReader,
    index: usize,
    info: EpisodeInfo,
}

impl<'a> Episode<'a> {
    /// Position of this episode among all episodes.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Global index of the first step.
    pub fn start(&self) -> usize {
        self.info.start
    }

    /// Number of steps in the episode.
    pub fn len(&self) -> usize {
        self.info.num_steps
    }

    /// Whether the episode has no steps.
    pub fn is_empty(&self) -> bool {
        self.info.num_steps == 0
    }

    /// Step `index` of this episode.
    pub fn get(&self, index: usize) -> Result<Step, BackendError> {
        check_access(self.backend, index, self.info.num_steps)?;
        self.backend.step(self.info.start + index)
    }

    /// Iterate over the episode's steps.
    pub fn iter(&self) -> StepIter<'a> {
        StepIter {
            backend: self.backend,
            next: self.info.start,
            end: self.info.end(),
        }
    }

    /// Episode-level metadata, read from the backend on each call.
    pub fn metadata(&self) -> Result<Option<Value>, BackendError> {
        Ok(self.backend.episode_info(self.index, true)?.metadata)
    }
}

impl fmt::Debug for Episode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Episode")
            .field("index", &self.index)
            .field("start", &self.info.start)
            .field("len", &self.info.num_steps)
            .finish()
    }
}

/// Per-episode metadata, aligned by index with [`Episodes`].
#[derive(Clone, Copy)]
pub struct EpisodeMetadata<'a> {
    backend: &'a dyn BackendReader,
}

impl<'a> EpisodeMetadata<'a> {
    /// View the episode metadata of `backend`.
    pub fn new(backend: &'a dyn BackendReader) -> Self {
        Self { backend }
    }

    /// Number of entries; always the number of episodes.
    pub fn len(&self) -> usize {
        self.backend.num_episodes()
    }

    /// Whether there are no episodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata of episode `index`, or `None` if none was recorded.
    pub fn get(&self, index: usize) -> Result<Option<Value>, BackendError> {
        check_access(self.backend, index, self.len())?;
        Ok(self.backend.episode_info(index, true)?.metadata)
    }

    /// Read every entry.
    pub fn to_vec(&self) -> Result<Vec<Option<Value>>, BackendError> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

impl fmt::Debug for EpisodeMetadata<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpisodeMetadata")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepType;

    /// Episodes of the given lengths; episode `i` carries metadata `i`
    /// when `i` is even.
    struct Fixed {
        lengths: Vec<usize>,
        closed: bool,
    }

    impl Fixed {
        fn starts(&self) -> Vec<usize> {
            self.lengths
                .iter()
                .scan(0, |acc, len| {
                    let start = *acc;
                    *acc += len;
                    Some(start)
                })
                .collect()
        }
    }

    impl BackendReader for Fixed {
        fn metadata(&self) -> Result<Option<Value>, BackendError> {
            Ok(None)
        }

        fn num_steps(&self) -> usize {
            self.lengths.iter().sum()
        }

        fn step(&self, index: usize) -> Result<Step, BackendError> {
            check_index(index, self.num_steps())?;
            Ok(Step::new(StepType::Mid, Value::Int(index as i64)))
        }

        fn num_episodes(&self) -> usize {
            self.lengths.len()
        }

        fn episode_info(
            &self,
            index: usize,
            include_metadata: bool,
        ) -> Result<EpisodeInfo, BackendError> {
            check_index(index, self.lengths.len())?;
            let metadata = (include_metadata && index % 2 == 0).then(|| Value::Int(index as i64));
            Ok(EpisodeInfo {
                start: self.starts()[index],
                num_steps: self.lengths[index],
                metadata,
            })
        }

        fn close(&mut self) {
            self.closed = true;
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    fn backend() -> Fixed {
        Fixed {
            lengths: vec![3, 5, 1],
            closed: false,
        }
    }

    #[test]
    fn step_count_matches_episode_lengths() {
        let b = backend();
        let total: usize = Episodes::new(&b).iter().map(|e| e.unwrap().len()).sum();
        assert_eq!(Steps::new(&b).len(), total);
    }

    #[test]
    fn episode_indices_are_local() {
        let b = backend();
        let second = Episodes::new(&b).get(1).unwrap();
        assert_eq!(second.start(), 3);
        assert_eq!(second.get(0).unwrap().observation, Value::Int(3));
        assert_eq!(second.get(4).unwrap().observation, Value::Int(7));
        assert!(matches!(
            second.get(5),
            Err(BackendError::IndexOutOfRange { index: 5, len: 5 })
        ));
    }

    #[test]
    fn episode_iter_yields_own_steps() {
        let b = backend();
        let last = Episodes::new(&b).get(2).unwrap();
        let obs: Vec<_> = last.iter().map(|s| s.unwrap().observation).collect();
        assert_eq!(obs, vec![Value::Int(8)]);
    }

    #[test]
    fn metadata_aligned_with_episodes() {
        let b = backend();
        let meta = EpisodeMetadata::new(&b);
        assert_eq!(meta.len(), Episodes::new(&b).len());
        assert_eq!(
            meta.to_vec().unwrap(),
            vec![Some(Value::Int(0)), None, Some(Value::Int(2))]
        );
        assert_eq!(
            Episodes::new(&b).get(0).unwrap().metadata().unwrap(),
            Some(Value::Int(0))
        );
    }

    #[test]
    fn step_iter_is_exact_size() {
        let b = backend();
        let it = Steps::new(&b).iter();
        assert_eq!(it.len(), 9);
        assert_eq!(it.count(), 9);
    }

    #[test]
    fn closed_backend_reports_closed() {
        let mut b = backend();
        b.close();
        assert!(matches!(Steps::new(&b).get(0), Err(BackendError::Closed)));
        assert!(matches!(Steps::new(&b).get(99), Err(BackendError::Closed)));
        assert!(matches!(Episodes::new(&b).get(0), Err(BackendError::Closed)));
        assert!(matches!(
            EpisodeMetadata::new(&b).get(0),
            Err(BackendError::Closed)
        ));
    }
}
