//! File and directory names of a log data directory.

use std::fs;
use std::path::{Path, PathBuf};

use trajlog_core::BackendError;

/// Backend-wide metadata, directly under the data directory.
pub const METADATA_FILE: &str = "metadata.trjl";
/// Length-prefixed step records.
pub const STEPS_FILE: &str = "steps.trjl";
/// Byte offset of every step record.
pub const STEP_OFFSETS_FILE: &str = "step_offsets.trjl";
/// One `(start, len, metadata offset)` entry per finalized episode.
pub const EPISODE_INDEX_FILE: &str = "episode_index.trjl";
/// Length-prefixed episode metadata values.
pub const EPISODE_METADATA_FILE: &str = "episode_metadata.trjl";

const SHARD_PREFIX: &str = "shard-";

/// Directory name of the shard with the given sequence number.
pub fn shard_dir_name(index: u32) -> String {
    format!("{SHARD_PREFIX}{index:06}")
}

/// Parse a shard directory name back to its sequence number.
pub fn parse_shard_dir_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(SHARD_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Shard directories under `data_dir`, ordered by sequence number.
pub fn list_shards(data_dir: &Path) -> Result<Vec<(u32, PathBuf)>, BackendError> {
    let mut shards = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(index) = name.to_str().and_then(parse_shard_dir_name) {
            shards.push((index, entry.path()));
        }
    }
    shards.sort_by_key(|(index, _)| *index);
    Ok(shards)
}
