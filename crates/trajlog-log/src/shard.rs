//! Random-access reader for one shard directory.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};
use trajlog_codec::wire::{decode_file_header, read_u32_le, step_from_bytes, value_from_bytes, HEADER_LEN};
use trajlog_codec::FileKind;
use trajlog_core::{BackendError, Step, Value};

use crate::layout::{EPISODE_INDEX_FILE, EPISODE_METADATA_FILE, STEPS_FILE, STEP_OFFSETS_FILE};

const OFFSET_RECORD_LEN: usize = 8;
const EPISODE_RECORD_LEN: usize = 24;

/// One finalized episode, in shard-local step indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EpisodeEntry {
    pub start: u64,
    pub len: u64,
    /// Byte offset of the metadata record; `0` means none was recorded.
    pub metadata_offset: u64,
}

/// A length-prefixed record file opened for seek-and-read access.
#[derive(Debug)]
struct RecordFile {
    path: PathBuf,
    file: Mutex<File>,
    len: u64,
}

impl RecordFile {
    fn open(path: PathBuf, kind: FileKind) -> Result<Self, BackendError> {
        let mut file = File::open(&path).map_err(|e| not_found_or_io(&path, e))?;
        let len = file.metadata()?.len();
        if len < HEADER_LEN {
            return Err(BackendError::NotFound {
                path,
                detail: "file holds no header".into(),
            });
        }
        decode_file_header(&mut file, kind)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            len,
        })
    }

    /// Body length of the record at `offset`, leaving `file` positioned
    /// at the body. `None` when the record does not lie inside the file.
    fn body_len(&self, file: &mut File, offset: u64) -> Result<Option<u64>, BackendError> {
        let inside = |end: Option<u64>| end.is_some_and(|end| end <= self.len);
        if offset < HEADER_LEN || !inside(offset.checked_add(4)) {
            return Ok(None);
        }
        file.seek(SeekFrom::Start(offset))?;
        let len = u64::from(read_u32_le(file)?);
        Ok(inside(offset.checked_add(4 + len)).then_some(len))
    }

    /// Whether a complete record starts at `offset`.
    fn holds_record(&self, offset: u64) -> Result<bool, BackendError> {
        let mut file = self.file.lock().map_err(|_| BackendError::Poisoned)?;
        Ok(self.body_len(&mut *file, offset)?.is_some())
    }

    /// Read the length-prefixed record starting at `offset`.
    fn read_record(&self, offset: u64) -> Result<Vec<u8>, BackendError> {
        let mut file = self.file.lock().map_err(|_| BackendError::Poisoned)?;
        let Some(len) = self.body_len(&mut *file, offset)? else {
            return Err(BackendError::corrupt(format!(
                "{}: record at offset {offset} lies outside file of {} bytes",
                self.path.display(),
                self.len
            )));
        };
        let mut buf = Vec::with_capacity(len as usize);
        Read::take(&mut *file, len).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

fn not_found_or_io(path: &Path, e: io::Error) -> BackendError {
    if e.kind() == io::ErrorKind::NotFound {
        BackendError::NotFound {
            path: path.to_path_buf(),
            detail: "missing shard file".into(),
        }
    } else {
        BackendError::Io(e)
    }
}

/// Read a fixed-width index file into memory, header stripped.
///
/// An empty file counts as missing: the writer never flushed it.
fn read_index_file(path: &Path, kind: FileKind) -> Result<Vec<u8>, BackendError> {
    let bytes = fs::read(path).map_err(|e| not_found_or_io(path, e))?;
    if bytes.is_empty() {
        return Err(BackendError::NotFound {
            path: path.to_path_buf(),
            detail: "index file is empty".into(),
        });
    }
    let mut cursor = bytes.as_slice();
    decode_file_header(&mut cursor, kind)?;
    Ok(cursor.to_vec())
}

fn u64_at(chunk: &[u8], at: usize) -> u64 {
    let mut le = [0u8; 8];
    le.copy_from_slice(&chunk[at..at + 8]);
    u64::from_le_bytes(le)
}

fn warn_partial(path: &Path, payload: usize, record: usize) {
    let rest = payload % record;
    if rest != 0 {
        warn!(
            file = %path.display(),
            bytes = rest,
            "ignoring partial trailing index record"
        );
    }
}

/// Validate episode entries against the step count.
///
/// Entries must tile `0..num_steps` without gaps. The first entry that
/// breaks the tiling and everything after it are dropped.
pub(crate) fn validate_episodes(
    entries: &[EpisodeEntry],
    num_steps: u64,
) -> (Vec<EpisodeEntry>, Option<String>) {
    let mut valid = Vec::with_capacity(entries.len());
    let mut next = 0u64;
    for (i, entry) in entries.iter().enumerate() {
        let end = entry.start.checked_add(entry.len);
        let problem = match end {
            _ if entry.start != next => Some(format!(
                "episode {i} starts at {} but previous ended at {next}",
                entry.start
            )),
            _ if entry.len == 0 => Some(format!("episode {i} is empty")),
            Some(end) if end > num_steps => Some(format!(
                "episode {i} ends at {end} past {num_steps} recorded steps"
            )),
            None => Some(format!("episode {i} length overflows")),
            Some(_) => None,
        };
        if let Some(problem) = problem {
            return (valid, Some(problem));
        }
        next += entry.len;
        valid.push(*entry);
    }
    (valid, None)
}

// ── ShardReader ─────────────────────────────────────────────────

/// Index of one shard plus open handles to its record files.
#[derive(Debug)]
pub(crate) struct ShardReader {
    dir: PathBuf,
    step_offsets: Vec<u64>,
    episodes: Vec<EpisodeEntry>,
    steps: RecordFile,
    episode_metadata: RecordFile,
}

impl ShardReader {
    /// Load the shard's indexes and open its record files.
    ///
    /// Returns [`BackendError::NotFound`] for a shard a writer left
    /// behind before finalizing a single episode.
    pub(crate) fn open(dir: &Path) -> Result<Self, BackendError> {
        let offsets_path = dir.join(STEP_OFFSETS_FILE);
        let payload = read_index_file(&offsets_path, FileKind::StepOffsets)?;
        warn_partial(&offsets_path, payload.len(), OFFSET_RECORD_LEN);
        let mut step_offsets: Vec<u64> = payload
            .chunks_exact(OFFSET_RECORD_LEN)
            .map(|c| u64_at(c, 0))
            .collect();

        // Index files may reach the disk ahead of the step bytes they
        // point at; only offsets of complete records count.
        let steps = RecordFile::open(dir.join(STEPS_FILE), FileKind::Steps)?;
        let indexed = step_offsets.len();
        while let Some(&last) = step_offsets.last() {
            if steps.holds_record(last)? {
                break;
            }
            step_offsets.pop();
        }
        if step_offsets.len() < indexed {
            warn!(
                shard = %dir.display(),
                dropped = indexed - step_offsets.len(),
                "ignoring step offsets past the end of the step file"
            );
        }

        let index_path = dir.join(EPISODE_INDEX_FILE);
        let payload = read_index_file(&index_path, FileKind::EpisodeIndex)?;
        warn_partial(&index_path, payload.len(), EPISODE_RECORD_LEN);
        let entries: Vec<EpisodeEntry> = payload
            .chunks_exact(EPISODE_RECORD_LEN)
            .map(|c| EpisodeEntry {
                start: u64_at(c, 0),
                len: u64_at(c, 8),
                metadata_offset: u64_at(c, 16),
            })
            .collect();
        let (episodes, problem) = validate_episodes(&entries, step_offsets.len() as u64);
        if let Some(problem) = problem {
            warn!(
                shard = %dir.display(),
                kept = episodes.len(),
                dropped = entries.len() - episodes.len(),
                "{problem}; ignoring remaining episodes"
            );
        }

        let covered = episodes.last().map_or(0, |e| e.start + e.len) as usize;
        if covered < step_offsets.len() {
            debug!(
                shard = %dir.display(),
                steps = step_offsets.len() - covered,
                "ignoring steps of an unfinished episode"
            );
            step_offsets.truncate(covered);
        }
        if step_offsets.is_empty() {
            return Err(BackendError::NotFound {
                path: dir.to_path_buf(),
                detail: "shard holds no finished episodes".into(),
            });
        }

        let episode_metadata =
            RecordFile::open(dir.join(EPISODE_METADATA_FILE), FileKind::EpisodeMetadata)?;

        debug!(
            shard = %dir.display(),
            steps = step_offsets.len(),
            episodes = episodes.len(),
            "loaded shard index"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            step_offsets,
            episodes,
            steps,
            episode_metadata,
        })
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn num_steps(&self) -> usize {
        self.step_offsets.len()
    }

    pub(crate) fn num_episodes(&self) -> usize {
        self.episodes.len()
    }

    /// Decode the step at shard-local `index`.
    pub(crate) fn step(&self, index: usize) -> Result<Step, BackendError> {
        let offset = *self
            .step_offsets
            .get(index)
            .ok_or(BackendError::IndexOutOfRange {
                index,
                len: self.step_offsets.len(),
            })?;
        let record = self.steps.read_record(offset)?;
        Ok(step_from_bytes(&record)?)
    }

    /// The index entry of shard-local episode `index`.
    pub(crate) fn episode(&self, index: usize) -> Result<EpisodeEntry, BackendError> {
        self.episodes
            .get(index)
            .copied()
            .ok_or(BackendError::IndexOutOfRange {
                index,
                len: self.episodes.len(),
            })
    }

    /// Load the metadata recorded for an episode, if any.
    pub(crate) fn episode_metadata(&self, entry: &EpisodeEntry) -> Result<Option<Value>, BackendError> {
        if entry.metadata_offset == 0 {
            return Ok(None);
        }
        let record = self.episode_metadata.read_record(entry.metadata_offset)?;
        Ok(Some(value_from_bytes(&record)?))
    }
}
