/// Control record holding the instant of the last rotation
///
/// Layout: exactly 8 bytes, big-endian `i64` Unix seconds. No header.
/// Stored at `<history_dir>/.<base name>.rtr`.
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::error::{Result, RotateError};
use super::perms;

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    file_mode: u32,
}

impl StateStore {
    pub fn new(history_dir: &Path, base_name: &str, file_mode: u32) -> Self {
        Self {
            path: history_dir.join(format!(".{}.rtr", base_name)),
            file_mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last rotation instant
    ///
    /// A missing record means "never rotated": `now` is written through and
    /// returned. Anything else that prevents reading a valid record fails.
    pub fn load(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No control record, starting a new period");
                self.save(now).map_err(|source| self.persistence(source))?;
                return Ok(truncate_to_secs(now));
            }
            Err(e) => return Err(self.persistence(e)),
        };

        let mut buf = [0u8; 8];
        file.read_exact(&mut buf)
            .map_err(|source| self.persistence(source))?;
        let secs = i64::from_be_bytes(buf);

        let last = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            self.persistence(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("timestamp {} out of range", secs),
            ))
        })?;

        debug!(path = %self.path.display(), last = %last, "Loaded control record");
        Ok(last)
    }

    /// Overwrite the record with `at`
    pub fn save(&self, at: DateTime<Utc>) -> io::Result<()> {
        let mut file = perms::create_truncate(&self.path, self.file_mode)?;
        file.write_all(&at.timestamp().to_be_bytes())?;
        file.flush()
    }

    fn persistence(&self, source: io::Error) -> RotateError {
        RotateError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

fn truncate_to_secs(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}
