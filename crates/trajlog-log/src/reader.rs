//! [`BackendReader`] over a log data directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use trajlog_codec::wire::{decode_file_header, value_from_bytes};
use trajlog_codec::FileKind;
use trajlog_core::{BackendError, BackendReader, EpisodeInfo, Step, Value};

use crate::config::LogReaderConfig;
use crate::layout::{list_shards, METADATA_FILE};
use crate::shard::ShardReader;

struct LoadedShard {
    reader: ShardReader,
    first_step: usize,
    first_episode: usize,
}

/// Reads a trajectory written by [`LogWriter`](crate::LogWriter).
///
/// Opening loads the metadata and every shard's step and episode index.
/// Steps and episode metadata are decoded on demand by seeking into the
/// shard files, so memory use grows with the number of steps but not
/// with their size.
///
/// The reader sees the log as it was when [`open`](Self::open) ran.
/// Episodes a writer finalizes afterwards need a fresh reader.
pub struct LogBackendReader {
    data_dir: PathBuf,
    metadata: Option<Value>,
    shards: Vec<LoadedShard>,
    num_steps: usize,
    num_episodes: usize,
    closed: bool,
}

fn read_metadata(data_dir: &Path) -> Result<Option<Value>, BackendError> {
    let path = data_dir.join(METADATA_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut cursor = bytes.as_slice();
    decode_file_header(&mut cursor, FileKind::Metadata)?;
    Ok(Some(value_from_bytes(cursor)?))
}

impl LogBackendReader {
    /// Open the log stored in `data_dir`.
    ///
    /// A directory without shards opens as an empty trajectory. Shards
    /// holding no finished episode are skipped with a warning when
    /// [`LogReaderConfig::tolerate_truncated_shards`] is set and fail the
    /// open with [`BackendError::NotFound`] otherwise.
    pub fn open(data_dir: impl AsRef<Path>, config: LogReaderConfig) -> Result<Self, BackendError> {
        config.validate()?;
        let data_dir = data_dir.as_ref().to_path_buf();
        if !data_dir.is_dir() {
            return Err(BackendError::NotFound {
                path: data_dir,
                detail: "log data directory does not exist".into(),
            });
        }
        let metadata = read_metadata(&data_dir)?;

        let mut shards = Vec::new();
        let mut num_steps = 0;
        let mut num_episodes = 0;
        for (index, dir) in list_shards(&data_dir)? {
            let reader = match ShardReader::open(&dir) {
                Ok(reader) => reader,
                Err(BackendError::NotFound { path, detail }) if config.tolerate_truncated_shards => {
                    warn!(
                        shard = index,
                        path = %path.display(),
                        %detail,
                        "skipping truncated shard"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            let (steps, episodes) = (reader.num_steps(), reader.num_episodes());
            shards.push(LoadedShard {
                reader,
                first_step: num_steps,
                first_episode: num_episodes,
            });
            num_steps += steps;
            num_episodes += episodes;
        }

        debug!(
            data_dir = %data_dir.display(),
            shards = shards.len(),
            steps = num_steps,
            episodes = num_episodes,
            "opened trajectory log"
        );
        Ok(Self {
            data_dir,
            metadata,
            shards,
            num_steps,
            num_episodes,
            closed: false,
        })
    }

    /// Directory the log is read from.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Shards loaded at open time; zero after close.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        Ok(())
    }

    /// The shard holding the item at global `index`, where `first` reads
    /// a shard's first global index. Shards are sorted by `first`.
    fn locate(&self, index: usize, first: impl Fn(&LoadedShard) -> usize) -> &LoadedShard {
        let pos = self.shards.partition_point(|s| first(s) <= index);
        &self.shards[pos.saturating_sub(1)]
    }
}

impl BackendReader for LogBackendReader {
    /// Metadata is cached at open and stays available after close.
    fn metadata(&self) -> Result<Option<Value>, BackendError> {
        Ok(self.metadata.clone())
    }

    fn num_steps(&self) -> usize {
        self.num_steps
    }

    fn step(&self, index: usize) -> Result<Step, BackendError> {
        self.ensure_open()?;
        if index >= self.num_steps {
            return Err(BackendError::IndexOutOfRange {
                index,
                len: self.num_steps,
            });
        }
        let shard = self.locate(index, |s| s.first_step);
        shard.reader.step(index - shard.first_step)
    }

    fn num_episodes(&self) -> usize {
        self.num_episodes
    }

    fn episode_info(&self, index: usize, include_metadata: bool) -> Result<EpisodeInfo, BackendError> {
        self.ensure_open()?;
        if index >= self.num_episodes {
            return Err(BackendError::IndexOutOfRange {
                index,
                len: self.num_episodes,
            });
        }
        let shard = self.locate(index, |s| s.first_episode);
        let entry = shard.reader.episode(index - shard.first_episode)?;
        let metadata = if include_metadata {
            shard.reader.episode_metadata(&entry)?
        } else {
            None
        };
        Ok(EpisodeInfo {
            start: shard.first_step + entry.start as usize,
            num_steps: entry.len as usize,
            metadata,
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for shard in self.shards.drain(..) {
            debug!(shard = %shard.reader.dir().display(), "closing shard");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl std::fmt::Debug for LogBackendReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBackendReader")
            .field("data_dir", &self.data_dir)
            .field("shards", &self.shards.len())
            .field("num_steps", &self.num_steps)
            .field("num_episodes", &self.num_episodes)
            .field("closed", &self.closed)
            .finish()
    }
}
