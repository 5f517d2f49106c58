//! Append-only writer for the sharded binary log.
//!
//! [`LogWriter`] owns one open shard at a time. Steps stream into the
//! shard's steps file as they arrive; an episode's index entry is only
//! written once the episode is finalized, so a reader never sees a
//! half-written episode.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use trajlog_codec::wire::{
    encode_file_header, encode_value, step_to_bytes, value_to_bytes, write_len, write_u64_le,
    HEADER_LEN,
};
use trajlog_codec::FileKind;
use trajlog_core::{BackendError, Step, Value};

use crate::config::LogWriterConfig;
use crate::layout::{
    list_shards, shard_dir_name, EPISODE_INDEX_FILE, EPISODE_METADATA_FILE, METADATA_FILE,
    STEPS_FILE, STEP_OFFSETS_FILE,
};

fn create_file(path: &Path, kind: FileKind) -> Result<BufWriter<File>, BackendError> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut writer = BufWriter::new(file);
    encode_file_header(&mut writer, kind)?;
    Ok(writer)
}

// ── ShardWriter ─────────────────────────────────────────────────

struct OpenEpisode {
    start: u64,
    metadata_offset: u64,
}

struct ShardWriter {
    dir: PathBuf,
    steps: BufWriter<File>,
    steps_pos: u64,
    step_offsets: BufWriter<File>,
    episode_index: BufWriter<File>,
    episode_metadata: BufWriter<File>,
    metadata_pos: u64,
    num_steps: u64,
    num_episodes: u64,
    open: Option<OpenEpisode>,
}

impl ShardWriter {
    fn create(dir: PathBuf) -> Result<Self, BackendError> {
        fs::create_dir(&dir)?;
        Ok(Self {
            steps: create_file(&dir.join(STEPS_FILE), FileKind::Steps)?,
            steps_pos: HEADER_LEN,
            step_offsets: create_file(&dir.join(STEP_OFFSETS_FILE), FileKind::StepOffsets)?,
            episode_index: create_file(&dir.join(EPISODE_INDEX_FILE), FileKind::EpisodeIndex)?,
            episode_metadata: create_file(
                &dir.join(EPISODE_METADATA_FILE),
                FileKind::EpisodeMetadata,
            )?,
            metadata_pos: HEADER_LEN,
            num_steps: 0,
            num_episodes: 0,
            open: None,
            dir,
        })
    }

    fn begin_episode(&mut self) {
        self.open = Some(OpenEpisode {
            start: self.num_steps,
            metadata_offset: 0,
        });
    }

    fn append_step(&mut self, step: &Step) -> Result<(), BackendError> {
        let record = step_to_bytes(step)?;
        write_len(&mut self.steps, record.len())?;
        self.steps.write_all(&record)?;
        write_u64_le(&mut self.step_offsets, self.steps_pos)?;
        self.steps_pos += 4 + record.len() as u64;
        self.num_steps += 1;
        Ok(())
    }

    fn set_episode_metadata(&mut self, metadata: &Value) -> Result<(), BackendError> {
        let Some(episode) = self.open.as_mut() else {
            return Err(BackendError::invalid_argument(
                "episode metadata set before the first step",
            ));
        };
        let record = value_to_bytes(metadata)?;
        write_len(&mut self.episode_metadata, record.len())?;
        self.episode_metadata.write_all(&record)?;
        // A later call for the same episode orphans the earlier record.
        episode.metadata_offset = self.metadata_pos;
        self.metadata_pos += 4 + record.len() as u64;
        Ok(())
    }

    fn finish_episode(&mut self) -> Result<(), BackendError> {
        let Some(episode) = self.open.take() else {
            return Ok(());
        };
        write_u64_le(&mut self.episode_index, episode.start)?;
        write_u64_le(&mut self.episode_index, self.num_steps - episode.start)?;
        write_u64_le(&mut self.episode_index, episode.metadata_offset)?;
        self.num_episodes += 1;
        Ok(())
    }

    /// Step records land before the offsets that point at them.
    fn flush(&mut self) -> Result<(), BackendError> {
        self.steps.flush()?;
        self.step_offsets.flush()?;
        self.episode_metadata.flush()?;
        self.episode_index.flush()?;
        Ok(())
    }
}

// ── LogWriter ───────────────────────────────────────────────────

/// Writes a trajectory into a log data directory.
///
/// # Examples
///
/// ```
/// use trajlog_core::{Step, StepType, Value};
/// use trajlog_log::{LogBackendReader, LogReaderConfig, LogWriter, LogWriterConfig};
/// use trajlog_core::BackendReader;
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut writer = LogWriter::create(dir.path(), None, LogWriterConfig::default()).unwrap();
/// writer.add_step(&Step::new(StepType::First, Value::from(0)), true).unwrap();
/// writer.add_step(&Step::new(StepType::Last, Value::from(1)), false).unwrap();
/// writer.close().unwrap();
///
/// let reader = LogBackendReader::open(dir.path(), LogReaderConfig::default()).unwrap();
/// assert_eq!(reader.num_steps(), 2);
/// assert_eq!(reader.num_episodes(), 1);
/// ```
pub struct LogWriter {
    data_dir: PathBuf,
    config: LogWriterConfig,
    shard: Option<ShardWriter>,
    next_shard: u32,
    episodes_in_shard: u64,
    num_steps: u64,
    num_episodes: u64,
    closed: bool,
}

impl LogWriter {
    /// Create a log in `data_dir`, creating the directory if needed.
    ///
    /// `metadata` is stored once for the whole trajectory; readers look
    /// for the environment specs under its `environment_specs` key.
    /// Fails if `data_dir` already holds a log.
    pub fn create(
        data_dir: impl AsRef<Path>,
        metadata: Option<&Value>,
        config: LogWriterConfig,
    ) -> Result<Self, BackendError> {
        config.validate()?;
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        let metadata_path = data_dir.join(METADATA_FILE);
        if metadata_path.exists() || !list_shards(&data_dir)?.is_empty() {
            return Err(BackendError::invalid_argument(format!(
                "{} already holds a trajectory log",
                data_dir.display()
            )));
        }
        if let Some(metadata) = metadata {
            let mut file = create_file(&metadata_path, FileKind::Metadata)?;
            encode_value(&mut file, metadata)?;
            file.flush()?;
        }
        info!(data_dir = %data_dir.display(), ?config, "created trajectory log");
        Ok(Self {
            data_dir,
            config,
            shard: None,
            next_shard: 0,
            episodes_in_shard: 0,
            num_steps: 0,
            num_episodes: 0,
            closed: false,
        })
    }

    /// Append a step.
    ///
    /// `new_episode` finalizes the running episode and starts another
    /// one with this step. The first step of a log always starts an
    /// episode.
    pub fn add_step(&mut self, step: &Step, new_episode: bool) -> Result<(), BackendError> {
        self.ensure_open()?;
        let in_episode = self.shard.as_ref().is_some_and(|s| s.open.is_some());
        if new_episode || !in_episode {
            self.begin_episode()?;
        }
        let flush = self.config.flush_every_step;
        let shard = self.current_shard()?;
        shard.append_step(step)?;
        if flush {
            shard.flush()?;
        }
        self.num_steps += 1;
        Ok(())
    }

    /// Attach metadata to the running episode, replacing any set before.
    pub fn set_episode_metadata(&mut self, metadata: &Value) -> Result<(), BackendError> {
        self.ensure_open()?;
        match self.shard.as_mut() {
            Some(shard) => shard.set_episode_metadata(metadata),
            None => Err(BackendError::invalid_argument(
                "episode metadata set before the first step",
            )),
        }
    }

    /// Push buffered records to the OS.
    ///
    /// The running episode stays invisible to readers until it is
    /// finalized by the next episode or by [`close`](Self::close).
    pub fn flush(&mut self) -> Result<(), BackendError> {
        self.ensure_open()?;
        match self.shard.as_mut() {
            Some(shard) => shard.flush(),
            None => Ok(()),
        }
    }

    /// Finalize the running episode and flush everything. Idempotent.
    pub fn close(&mut self) -> Result<(), BackendError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut shard) = self.shard.take() {
            shard.finish_episode()?;
            shard.flush()?;
        }
        debug!(
            data_dir = %self.data_dir.display(),
            steps = self.num_steps,
            episodes = self.num_episodes,
            "closed trajectory log"
        );
        Ok(())
    }

    /// Directory the log is written to.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Steps written so far.
    pub fn num_steps(&self) -> u64 {
        self.num_steps
    }

    /// Episodes started so far, including the running one.
    pub fn num_episodes(&self) -> u64 {
        self.num_episodes
    }

    /// Shards created so far.
    pub fn num_shards(&self) -> u32 {
        self.next_shard
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        Ok(())
    }

    fn current_shard(&mut self) -> Result<&mut ShardWriter, BackendError> {
        self.shard
            .as_mut()
            .ok_or_else(|| BackendError::corrupt("no open shard"))
    }

    fn begin_episode(&mut self) -> Result<(), BackendError> {
        if let Some(shard) = self.shard.as_mut() {
            shard.finish_episode()?;
        }
        let rotate = match (&self.shard, self.config.max_episodes_per_shard) {
            (None, _) => true,
            (Some(_), Some(max)) => self.episodes_in_shard >= max,
            (Some(_), None) => false,
        };
        if rotate {
            self.rotate()?;
        }
        self.current_shard()?.begin_episode();
        self.episodes_in_shard += 1;
        self.num_episodes += 1;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), BackendError> {
        if let Some(mut shard) = self.shard.take() {
            shard.finish_episode()?;
            shard.flush()?;
            debug!(
                shard = %shard.dir.display(),
                steps = shard.num_steps,
                episodes = shard.num_episodes,
                "finished shard"
            );
        }
        let dir = self.data_dir.join(shard_dir_name(self.next_shard));
        self.next_shard += 1;
        self.shard = Some(ShardWriter::create(dir)?);
        self.episodes_in_shard = 0;
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(data_dir = %self.data_dir.display(), error = %e, "failed to close trajectory log");
        }
    }
}
