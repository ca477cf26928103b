//! Discovery of block-range partition files in the trades directory.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One partition of the trade source: `trades_{start}_{end}.parquet` (or
/// `.csv`), covering a contiguous block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFile {
    pub start_block: u64,
    pub end_block: u64,
    pub path: PathBuf,
}

impl PartitionFile {
    pub fn range(&self) -> (u64, u64) {
        (self.start_block, self.end_block)
    }
}

/// Scan the trades directory for partition files, sorted by start block.
///
/// A missing or unreadable directory yields an empty list (the caller
/// degrades to an empty result set); files that do not match the naming
/// scheme are ignored.
pub fn scan_partitions(trades_dir: &Path) -> Vec<PartitionFile> {
    let entries = match fs::read_dir(trades_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %trades_dir.display(), error = %e, "trades directory unreadable");
            return Vec::new();
        }
    };

    let mut files: Vec<PartitionFile> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| parse_partition_name(&entry.path()))
        .collect();

    files.sort_by_key(|f| (f.start_block, f.end_block));
    files
}

/// Parse `trades_{start}_{end}.parquet` / `.csv` into a partition entry.
fn parse_partition_name(path: &Path) -> Option<PartitionFile> {
    let ext = path.extension()?.to_str()?;
    if ext != "parquet" && ext != "csv" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let rest = stem.strip_prefix("trades_")?;
    let (start, end) = rest.split_once('_')?;
    Some(PartitionFile {
        start_block: start.parse().ok()?,
        end_block: end.parse().ok()?,
        path: path.to_path_buf(),
    })
}
