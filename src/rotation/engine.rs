/// The rotating file writer
///
/// A [`Rotator`] owns one active file. Every write first asks whether the
/// file must be retired (size threshold, then calendar boundary); if so the
/// file is renamed into the history tree, a fresh file takes its place, and a
/// background [`Retirement`] compresses the old one and applies retention.
///
/// ## Concurrency
///
/// The rotation check, the swap, and the append of a single `write` all run
/// under one lock, so concurrent producers never interleave inside one call
/// and never append to a handle that is being replaced.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::catalog::{COMPRESSED_SUFFIX, HistoryCatalog, HistoryEntry, with_suffix};
use super::clock::{Clock, SystemClock};
use super::error::{Result, RotateError};
use super::options::RotationOptions;
use super::perms;
use super::retention::Retirement;
use super::state::StateStore;
use super::template;
use super::tracker::TaskTracker;
use crate::observability::{Metrics, MetricsSnapshot};

struct Active {
    file: Option<File>,
    last_rotation: Option<DateTime<Utc>>,
    /// Destination of the last abandoned rotation
    abandoned: Option<PathBuf>,
}

pub struct Rotator {
    path: PathBuf,
    options: RotationOptions,
    history_dir: PathBuf,
    entry_template: String,
    file_mode: u32,
    dir_mode: u32,
    state: StateStore,
    catalog: HistoryCatalog,
    clock: Arc<dyn Clock>,
    active: Mutex<Active>,
    tasks: Arc<TaskTracker>,
    metrics: Arc<Metrics>,
}

impl Rotator {
    /// Build a rotator for `path`; nothing touches the filesystem until
    /// [`Rotator::open`] or the first write
    pub fn new(path: impl Into<PathBuf>, options: RotationOptions) -> Result<Self> {
        Self::with_clock(path, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        path: impl Into<PathBuf>,
        options: RotationOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let path = path.into();
        let base_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} does not name a file", path.display()),
                )
            })?
            .to_string();
        let stem = Path::new(&base_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&base_name)
            .to_string();
        let ext = Path::new(&base_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let history_dir = options.effective_history_dir(&path);
        let file_mode = options.effective_file_mode();
        let dir_mode = options.effective_dir_mode();

        Ok(Self {
            entry_template: options.entry_template(&stem, &ext),
            state: StateStore::new(&history_dir, &base_name, file_mode),
            catalog: HistoryCatalog::new(&history_dir, &stem, &ext),
            path,
            options,
            history_dir,
            file_mode,
            dir_mode,
            clock,
            active: Mutex::new(Active {
                file: None,
                last_rotation: None,
                abandoned: None,
            }),
            tasks: TaskTracker::new(),
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &RotationOptions {
        &self.options
    }

    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    pub fn is_open(&self) -> bool {
        self.active.lock().file.is_some()
    }

    /// Instant of the last rotation, known once the rotator is open
    pub fn last_rotation(&self) -> Option<DateTime<Utc>> {
        self.active.lock().last_rotation
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of background retirements still running
    pub fn pending_tasks(&self) -> usize {
        self.tasks.in_flight()
    }

    /// Prepare directories, load the control record and open the active file
    pub fn open(&self) -> Result<()> {
        let mut active = self.active.lock();
        self.open_locked(&mut active)
    }

    /// Append `buf`, rotating first when a boundary has been reached
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut active = self.active.lock();
        if active.file.is_none() {
            self.open_locked(&mut active)?;
        }

        if self.should_rotate_locked(&mut active, buf.len() as u64)? {
            if self.blocked_by_collision(&active) {
                debug!(path = %self.path.display(), "Rotation still blocked, appending");
            } else {
                self.rotate_locked(&mut active)?;
            }
        }

        let file = active.file.as_mut().ok_or_else(|| not_open(&self.path))?;
        file.write_all(buf)?;
        self.metrics.bytes_written(buf.len());
        Ok(buf.len())
    }

    /// Whether a write of `increase` bytes would rotate first
    pub fn should_rotate(&self, increase: u64) -> Result<bool> {
        let mut active = self.active.lock();
        if active.file.is_none() {
            self.open_locked(&mut active)?;
        }
        self.should_rotate_locked(&mut active, increase)
    }

    /// Rotate now regardless of size or calendar
    ///
    /// Returns the new history entry, or `None` when the attempt was
    /// abandoned; in both cases the rotator can still be written to.
    pub fn rotate(&self) -> Result<Option<HistoryEntry>> {
        let mut active = self.active.lock();
        if active.file.is_none() {
            self.open_locked(&mut active)?;
        }
        self.rotate_locked(&mut active)
    }

    /// Compressed history entries within `[from, to]`, most recent first
    pub fn history(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<HistoryEntry>> {
        Ok(self.catalog.list_entries(from, to)?)
    }

    /// Wait for background retirements, then close the active file
    ///
    /// Safe to call more than once; a later write reopens the file.
    pub fn close(&self) -> Result<()> {
        self.tasks.wait();

        let mut active = self.active.lock();
        if let Some(file) = active.file.take() {
            file.sync_all()?;
            debug!(path = %self.path.display(), "Rotator closed");
        }
        Ok(())
    }

    fn open_locked(&self, active: &mut Active) -> Result<()> {
        if active.file.is_some() {
            return Err(RotateError::AlreadyOpen(self.path.clone()));
        }

        perms::ensure_dir(&self.history_dir, self.dir_mode)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            perms::ensure_dir(parent, self.dir_mode)?;
        }

        let last = self.state.load(self.clock.now())?;

        match fs::metadata(&self.path) {
            Ok(_) => {
                if let Err(e) = perms::set_mode(&self.path, self.file_mode) {
                    warn!(path = %self.path.display(), error = %e, "Failed to apply file mode");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        active.file = Some(perms::open_append(&self.path, self.file_mode)?);
        active.last_rotation = Some(last);

        info!(
            path = %self.path.display(),
            history_dir = %self.history_dir.display(),
            last_rotation = %last,
            "Rotator opened"
        );
        Ok(())
    }

    fn should_rotate_locked(&self, active: &mut Active, increase: u64) -> Result<bool> {
        if let Some(threshold) = self.options.size_threshold() {
            if let Some(file) = active.file.as_mut() {
                let size = file.seek(SeekFrom::End(0))?;
                if size.saturating_add(increase) > threshold {
                    debug!(size, increase, threshold, "Size threshold reached");
                    return Ok(true);
                }
            }
        }

        let Some(last) = active.last_rotation else {
            return Ok(false);
        };
        let now = self.clock.now();
        let (last, now) = (self.clock.local(&last), self.clock.local(&now));
        Ok(!self.options.effective_duration().same_period(&last, &now))
    }

    fn rotate_locked(&self, active: &mut Active) -> Result<Option<HistoryEntry>> {
        let now = self.clock.now();
        let relative = template::format(&now, &self.entry_template);
        let history_path = self.history_dir.join(&relative);

        let stamp = active.last_rotation.map_or(now, |last| last.max(now));
        if let Err(e) = self.state.save(stamp) {
            warn!(
                path = %self.state.path().display(),
                error = %e,
                "Failed to save rotation control record"
            );
        }
        active.last_rotation = Some(stamp);

        // Closing before the rename keeps this portable
        drop(active.file.take());

        let retired = self.move_to_history(&history_path);
        active.abandoned = retired.is_err().then(|| history_path.clone());
        if let Err(e) = &retired {
            self.metrics.rotation_failed();
            warn!(
                path = %self.path.display(),
                entry = %relative,
                error = %e,
                "Rotation abandoned, keeping the active file"
            );
        }

        active.file = Some(self.reopen()?);

        if retired.is_err() {
            return Ok(None);
        }

        self.metrics.rotation();
        info!(path = %self.path.display(), entry = %relative, "Log rotated");

        let retirement = Retirement {
            path: history_path,
            file_mode: self.file_mode,
            history_count: self.options.history_count,
            catalog: self.catalog.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        if let Err(e) = self
            .tasks
            .spawn("logbox-retire".to_string(), move || retirement.run())
        {
            self.metrics.retire_failed();
            error!(entry = %relative, error = %e, "Failed to start history compression");
        }

        let at = DateTime::<Utc>::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        Ok(Some(HistoryEntry::new(at, relative, &self.history_dir, false)))
    }

    /// Whether a rotation now would target the destination that just failed
    fn blocked_by_collision(&self, active: &Active) -> bool {
        active.abandoned.as_deref().is_some_and(|abandoned| {
            let relative = template::format(&self.clock.now(), &self.entry_template);
            self.history_dir.join(relative) == abandoned
        })
    }

    fn move_to_history(&self, history_path: &Path) -> io::Result<()> {
        if let Some(dir) = history_path.parent() {
            perms::create_dir_all(dir, self.dir_mode)?;
        }
        if history_path.exists() || with_suffix(history_path, COMPRESSED_SUFFIX).exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", history_path.display()),
            ));
        }
        fs::rename(&self.path, history_path)
    }

    /// A fresh active file, or the old one reopened for append
    fn reopen(&self) -> Result<File> {
        match perms::open_append(&self.path, self.file_mode) {
            Ok(file) => Ok(file),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to open fresh active file");
                Ok(OpenOptions::new().append(true).open(&self.path)?)
            }
        }
    }

    fn flush_active(&self) -> io::Result<()> {
        match self.active.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for Rotator {
    fn drop(&mut self) {
        self.tasks.wait();
    }
}

impl std::fmt::Debug for Rotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rotator")
            .field("path", &self.path)
            .field("history_dir", &self.history_dir)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Write for Rotator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Rotator::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_active()
    }
}

impl Write for &Rotator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Rotator::write(*self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_active()
    }
}

fn not_open(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("{} is not open", path.display()),
    )
}
