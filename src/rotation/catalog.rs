/// History catalog rebuilt from the directory tree
///
/// There is no separate index: every file under the history root named
/// `<stem>_<YYYYMMDDThhmmssZ><ext>.gz` is one entry.
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::read::GzDecoder;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::template::TIMESTAMP_LEN;

/// Suffix appended to compressed entries
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// One retired log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    timestamp: DateTime<Utc>,
    relative_path: PathBuf,
    root: PathBuf,
    compressed: bool,
}

impl HistoryEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        relative_path: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        compressed: bool,
    ) -> Self {
        Self {
            timestamp,
            relative_path: relative_path.into(),
            root: root.into(),
            compressed,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Path relative to the history root, without the compressed suffix
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Location of the uncompressed form
    pub fn plain_path(&self) -> PathBuf {
        self.root.join(&self.relative_path)
    }

    /// Location of the backing file
    pub fn abs_path(&self) -> PathBuf {
        let plain = self.plain_path();
        if self.compressed {
            with_suffix(&plain, COMPRESSED_SUFFIX)
        } else {
            plain
        }
    }

    /// Open the entry's contents, decompressing when needed
    ///
    /// Falls back to the compressed file when the plain one is gone, which is
    /// the normal state shortly after rotation.
    pub fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
        if !self.compressed {
            match File::open(self.plain_path()) {
                Ok(file) => return Ok(Box::new(file)),
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                Err(_) => {}
            }
        }
        let file = File::open(with_suffix(&self.plain_path(), COMPRESSED_SUFFIX))?;
        Ok(Box::new(GzDecoder::new(file)))
    }
}

/// Scans one history root for the entries of one log file
#[derive(Debug, Clone)]
pub struct HistoryCatalog {
    root: PathBuf,
    prefix: String,
    suffix: String,
}

impl HistoryCatalog {
    pub fn new(root: impl Into<PathBuf>, stem: &str, ext: &str) -> Self {
        Self {
            root: root.into(),
            prefix: format!("{}_", stem),
            suffix: format!("{}{}", ext, COMPRESSED_SUFFIX),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List entries within `[from, to]`, most recent first
    pub fn list_entries(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> io::Result<Vec<HistoryEntry>> {
        let mut entries = Vec::new();

        for item in WalkDir::new(&self.root).min_depth(1) {
            let item = match item {
                Ok(item) => item,
                Err(e) if e.depth() == 0 => {
                    if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) {
                        return Ok(Vec::new());
                    }
                    return Err(e.into());
                }
                Err(e) => {
                    // Entries pruned by a concurrent task disappear mid-walk
                    debug!(error = %e, "Skipping unreadable history path");
                    continue;
                }
            };

            if !item.file_type().is_file() {
                continue;
            }
            if let Some(entry) = self.parse_entry(item.path()) {
                entries.push(entry);
            }
        }

        if let Some(from) = from {
            entries.retain(|e| e.timestamp >= from);
        }
        if let Some(to) = to {
            entries.retain(|e| e.timestamp <= to);
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    fn parse_entry(&self, path: &Path) -> Option<HistoryEntry> {
        let name = path.file_name()?.to_str()?;
        let info = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if info.len() != TIMESTAMP_LEN {
            return None;
        }

        let timestamp = match parse_timestamp(info) {
            Some(ts) => ts,
            None => {
                warn!(path = %path.display(), "Bad history entry name");
                return None;
            }
        };

        let relative = path.strip_prefix(&self.root).ok()?;
        let plain_name = name.strip_suffix(COMPRESSED_SUFFIX)?;
        let relative_path = relative.with_file_name(plain_name);

        Some(HistoryEntry::new(timestamp, relative_path, &self.root, true))
    }
}

/// Parse `YYYYMMDDThhmmssZ`
pub fn parse_timestamp(info: &str) -> Option<DateTime<Utc>> {
    let bytes = info.as_bytes();
    if bytes.len() != TIMESTAMP_LEN || bytes[8] != b'T' || bytes[14] != b'Z' {
        return None;
    }
    let digits_ok = bytes[..8]
        .iter()
        .chain(&bytes[9..14])
        .all(u8::is_ascii_digit);
    if !digits_ok {
        return None;
    }
    NaiveDateTime::parse_from_str(&info[..14], "%Y%m%dT%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("20240115T143045Z"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 45).unwrap())
        );
        assert_eq!(parse_timestamp("20240115T143045"), None);
        assert_eq!(parse_timestamp("2024011aT143045Z"), None);
        assert_eq!(parse_timestamp("20241315T143045Z"), None);
        assert_eq!(parse_timestamp("20240115X143045Z"), None);
    }

    #[test]
    fn test_lists_descending() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "2024/01/app_20240110T090000Z.log.gz");
        touch(temp.path(), "2024/01/app_20240115T143045Z.log.gz");

        let catalog = HistoryCatalog::new(temp.path(), "app", ".log");
        let entries = catalog.list_entries(None, None).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].relative_path(),
            Path::new("2024/01/app_20240115T143045Z.log")
        );
        assert_eq!(
            entries[1].relative_path(),
            Path::new("2024/01/app_20240110T090000Z.log")
        );
        assert!(entries.iter().all(HistoryEntry::is_compressed));
        assert_eq!(
            entries[0].abs_path(),
            temp.path().join("2024/01/app_20240115T143045Z.log.gz")
        );
    }

    #[test]
    fn test_ignores_foreign_and_malformed_files() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "app_20240115T143045Z.log.gz");
        touch(temp.path(), "app_20240115T143045Z.log");
        touch(temp.path(), "other_20240115T143045Z.log.gz");
        touch(temp.path(), "app_2024011xT143045Z.log.gz");
        touch(temp.path(), "app_short.log.gz");
        touch(temp.path(), ".app.log.rtr");

        let catalog = HistoryCatalog::new(temp.path(), "app", ".log");
        let entries = catalog.list_entries(None, None).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_range_filter_is_inclusive() {
        let temp = TempDir::new().unwrap();
        for day in 10..=14 {
            touch(temp.path(), &format!("app_202401{}T000000Z.log.gz", day));
        }

        let catalog = HistoryCatalog::new(temp.path(), "app", ".log");
        let from = Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap();

        let entries = catalog.list_entries(Some(from), Some(to)).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].timestamp(), to);
        assert_eq!(entries[2].timestamp(), from);

        assert_eq!(catalog.list_entries(Some(from), None).unwrap().len(), 4);
        assert_eq!(catalog.list_entries(None, Some(to)).unwrap().len(), 4);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let catalog = HistoryCatalog::new(temp.path().join("nope"), "app", ".log");
        assert!(catalog.list_entries(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_extensionless_base_name() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "out_20240115T143045Z.gz");

        let catalog = HistoryCatalog::new(temp.path(), "out", "");
        assert_eq!(catalog.list_entries(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_reader_decompresses() {
        let temp = TempDir::new().unwrap();
        let gz_path = temp.path().join("app_20240115T143045Z.log.gz");
        let mut encoder = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
        encoder.write_all(b"hello history\n").unwrap();
        encoder.finish().unwrap();

        let catalog = HistoryCatalog::new(temp.path(), "app", ".log");
        let entry = &catalog.list_entries(None, None).unwrap()[0];

        let mut contents = String::new();
        entry.reader().unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello history\n");
    }

    #[test]
    fn test_reader_falls_back_to_compressed_form() {
        let temp = TempDir::new().unwrap();
        let gz_path = temp.path().join("app_20240115T143045Z.log.gz");
        let mut encoder = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
        encoder.write_all(b"moved").unwrap();
        encoder.finish().unwrap();

        let entry = HistoryEntry::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 45).unwrap(),
            "app_20240115T143045Z.log",
            temp.path(),
            false,
        );

        let mut contents = String::new();
        entry.reader().unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "moved");
    }
}
