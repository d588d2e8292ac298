/// Background retirement: compress a rotated file, then enforce retention
///
/// One [`Retirement`] runs per rotation on its own thread. Nothing here is
/// reported back to writers; failures are logged and counted.
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::catalog::{COMPRESSED_SUFFIX, HistoryCatalog, with_suffix};
use super::perms;
use crate::humanize::ByteSize;
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum RetireError {
    #[error("Failed to open {path} for compression: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to compress {path}: {source}")]
    Compress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to scan history: {0}")]
    Scan(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, RetireError>;

/// Sizes before and after compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressStats {
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

/// Outcome of one pruning pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub entries_removed: usize,
    pub dirs_removed: usize,
    pub failures: usize,
}

/// Work item for one retired file
#[derive(Debug, Clone)]
pub struct Retirement {
    /// Uncompressed retired file
    pub path: PathBuf,
    pub file_mode: u32,
    pub history_count: i64,
    pub catalog: HistoryCatalog,
    pub metrics: Arc<Metrics>,
}

impl Retirement {
    pub fn run(self) {
        match compress(&self.path, self.file_mode) {
            Ok(stats) => {
                self.metrics.entry_compressed();
                debug!(
                    path = %self.path.display(),
                    size = %ByteSize(stats.original_bytes as i64),
                    compressed = %ByteSize(stats.compressed_bytes as i64),
                    "History entry compressed"
                );
            }
            Err(e) => {
                self.metrics.retire_failed();
                error!(error = %e, "History compression aborted");
                return;
            }
        }

        if self.history_count <= 0 {
            return;
        }

        match prune(&self.catalog, self.history_count as usize) {
            Ok(stats) => {
                self.metrics.entries_pruned(stats.entries_removed);
                if stats.failures > 0 {
                    self.metrics.retire_failed();
                }
                if stats.entries_removed > 0 {
                    info!(
                        removed = stats.entries_removed,
                        dirs_removed = stats.dirs_removed,
                        keep = self.history_count,
                        "Pruned old history entries"
                    );
                }
            }
            Err(e) => {
                self.metrics.retire_failed();
                error!(error = %e, "History pruning aborted");
            }
        }
    }
}

/// Gzip `path` into `<path>.gz` and remove the original
///
/// The source is only removed after the compressed stream is complete. On
/// failure the partial output is discarded and the source is kept.
pub fn compress(path: &Path, file_mode: u32) -> Result<CompressStats> {
    let source = File::open(path).map_err(|source| RetireError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let dest = with_suffix(path, COMPRESSED_SUFFIX);

    let written = gzip_into(source, &dest, file_mode).map_err(|source| {
        if let Err(e) = perms::remove_file_if_exists(&dest) {
            warn!(path = %dest.display(), error = %e, "Failed to discard partial archive");
        }
        RetireError::Compress {
            path: path.to_path_buf(),
            source,
        }
    })?;

    perms::remove_file_if_exists(path).map_err(|source| RetireError::Compress {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(CompressStats {
        original_bytes: written,
        compressed_bytes: fs::metadata(&dest).map(|m| m.len()).unwrap_or(0),
    })
}

fn gzip_into(source: File, dest: &Path, file_mode: u32) -> io::Result<u64> {
    let out = perms::create_truncate(dest, file_mode)?;
    let mut encoder = GzEncoder::new(BufWriter::new(out), Compression::default());
    let written = io::copy(&mut BufReader::new(source), &mut encoder)?;
    let out = encoder
        .finish()?
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?;
    out.sync_all()?;
    Ok(written)
}

/// Delete every entry past the `keep` most recent ones
///
/// Directories emptied by a deletion are removed bottom-up until a
/// non-empty one or the history root is reached. Files or directories that
/// are already gone count as removed by someone else and are not errors.
pub fn prune(catalog: &HistoryCatalog, keep: usize) -> Result<PruneStats> {
    let entries = catalog.list_entries(None, None).map_err(RetireError::Scan)?;
    let mut stats = PruneStats::default();

    for entry in entries.iter().skip(keep) {
        let path = entry.abs_path();
        match perms::remove_file_if_exists(&path) {
            Ok(removed) => {
                if removed {
                    stats.entries_removed += 1;
                    debug!(path = %path.display(), "Removed history entry");
                }
            }
            Err(e) => {
                stats.failures += 1;
                error!(path = %path.display(), error = %e, "Failed to remove history entry");
                continue;
            }
        }

        if let Some(dir) = entry.relative_path().parent() {
            stats.dirs_removed += remove_empty_parents(catalog.root(), dir);
        }
    }

    Ok(stats)
}

/// Walk from `relative_dir` up toward `root`, removing empty directories
fn remove_empty_parents(root: &Path, relative_dir: &Path) -> usize {
    let mut removed = 0;

    for dir in relative_dir.ancestors() {
        if dir.as_os_str().is_empty() {
            break;
        }
        let abs = root.join(dir);

        match fs::read_dir(&abs) {
            Ok(mut children) => {
                if children.next().is_some() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(path = %abs.display(), error = %e, "Failed to inspect history directory");
                break;
            }
        }

        match fs::remove_dir(&abs) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                // A concurrent rotation may have just written into it
                debug!(path = %abs.display(), error = %e, "History directory not removed");
                break;
            }
        }
    }

    removed
}
