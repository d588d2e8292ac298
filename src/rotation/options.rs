use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use super::error::RotateError;
use super::template::{self, DEFAULT_HISTORY_PATH};

/// Size threshold used when `max_size` is zero (10 MiB)
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Permission bits for created files when none are configured
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// Calendar period after which the active file is rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationDuration {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
}

impl RotationDuration {
    /// Single-letter code: `Y`, `M`, `W`, `D`, `h`, `m`
    pub fn code(self) -> char {
        match self {
            RotationDuration::Yearly => 'Y',
            RotationDuration::Monthly => 'M',
            RotationDuration::Weekly => 'W',
            RotationDuration::Daily => 'D',
            RotationDuration::Hourly => 'h',
            RotationDuration::Minutely => 'm',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'Y' => Some(RotationDuration::Yearly),
            'M' => Some(RotationDuration::Monthly),
            'W' => Some(RotationDuration::Weekly),
            'D' => Some(RotationDuration::Daily),
            'h' => Some(RotationDuration::Hourly),
            'm' => Some(RotationDuration::Minutely),
            _ => None,
        }
    }

    /// Whether `a` and `b` fall in the same period of their own calendar
    ///
    /// Fields are read in each instant's zone, so pass local times to get
    /// local midnights and week starts.
    pub fn same_period<Tz: TimeZone>(self, a: &DateTime<Tz>, b: &DateTime<Tz>) -> bool {
        let same_day = a.date_naive() == b.date_naive();
        match self {
            RotationDuration::Minutely => {
                same_day && a.hour() == b.hour() && a.minute() == b.minute()
            }
            RotationDuration::Hourly => same_day && a.hour() == b.hour(),
            RotationDuration::Daily => same_day,
            RotationDuration::Weekly => a.iso_week() == b.iso_week(),
            RotationDuration::Monthly => a.year() == b.year() && a.month() == b.month(),
            RotationDuration::Yearly => a.year() == b.year(),
        }
    }
}

impl FromStr for RotationDuration {
    type Err = RotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => Self::from_code(code),
            _ => None,
        }
        .ok_or_else(|| RotateError::InvalidDuration(s.to_string()))
    }
}

impl fmt::Display for RotationDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Rotation settings, fixed once the rotator is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOptions {
    /// Directory template inside `history_dir`
    pub history_path: String,
    /// Byte threshold; `0` uses `default_max_size`, negative disables
    pub max_size: i64,
    pub default_max_size: u64,
    /// `None` rotates monthly
    pub duration: Option<RotationDuration>,
    /// `None` puts history next to the active file as `<path>.history`
    pub history_dir: Option<PathBuf>,
    /// Entries kept after pruning; `0` or less keeps everything
    pub history_count: i64,
    pub file_mode: Option<u32>,
    pub dir_mode: Option<u32>,
}

impl Default for RotationOptions {
    fn default() -> Self {
        Self {
            history_path: DEFAULT_HISTORY_PATH.to_string(),
            max_size: 0,
            default_max_size: DEFAULT_MAX_SIZE,
            duration: None,
            history_dir: None,
            history_count: 0,
            file_mode: None,
            dir_mode: None,
        }
    }
}

impl RotationOptions {
    pub fn with_max_size(mut self, max_size: i64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_duration(mut self, duration: RotationDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = Some(dir.into());
        self
    }

    pub fn with_history_path(mut self, template: impl Into<String>) -> Self {
        self.history_path = template.into();
        self
    }

    pub fn with_history_count(mut self, count: i64) -> Self {
        self.history_count = count;
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = Some(mode);
        self
    }

    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = Some(mode);
        self
    }

    /// Byte threshold in effect, `None` when size rotation is disabled
    pub fn size_threshold(&self) -> Option<u64> {
        match self.max_size {
            n if n < 0 => None,
            0 => Some(self.default_max_size),
            n => Some(n as u64),
        }
    }

    pub fn effective_duration(&self) -> RotationDuration {
        self.duration.unwrap_or(RotationDuration::Monthly)
    }

    pub fn effective_file_mode(&self) -> u32 {
        self.file_mode.unwrap_or(DEFAULT_FILE_MODE)
    }

    /// Explicit dir mode, or the file mode with owner execute added
    pub fn effective_dir_mode(&self) -> u32 {
        self.dir_mode
            .unwrap_or_else(|| self.effective_file_mode() | 0o100)
    }

    pub fn effective_history_dir(&self, active: &Path) -> PathBuf {
        self.history_dir.clone().unwrap_or_else(|| {
            let mut dir = active.as_os_str().to_os_string();
            dir.push(".history");
            PathBuf::from(dir)
        })
    }

    /// Full template for a retired file, relative to the history root
    pub fn entry_template(&self, stem: &str, ext: &str) -> String {
        let name = template::entry_name_template(stem, ext);
        let dir = self.history_path.trim_matches('/');
        if dir.is_empty() {
            name
        } else {
            format!("{}/{}", dir, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_duration_codes() {
        for code in ['Y', 'M', 'W', 'D', 'h', 'm'] {
            let duration = RotationDuration::from_code(code).unwrap();
            assert_eq!(duration.code(), code);
            assert_eq!(code.to_string().parse::<RotationDuration>().unwrap(), duration);
        }
        assert!("x".parse::<RotationDuration>().is_err());
        assert!("MM".parse::<RotationDuration>().is_err());
        assert!("".parse::<RotationDuration>().is_err());
    }

    #[test]
    fn test_same_period_granularity() {
        let base = at(2024, 1, 15, 14, 30, 45);

        assert!(RotationDuration::Minutely.same_period(&base, &at(2024, 1, 15, 14, 30, 0)));
        assert!(!RotationDuration::Minutely.same_period(&base, &at(2024, 1, 15, 14, 31, 0)));

        assert!(RotationDuration::Hourly.same_period(&base, &at(2024, 1, 15, 14, 59, 59)));
        assert!(!RotationDuration::Hourly.same_period(&base, &at(2024, 1, 16, 14, 30, 45)));

        assert!(RotationDuration::Daily.same_period(&base, &at(2024, 1, 15, 0, 0, 0)));
        assert!(!RotationDuration::Daily.same_period(&base, &at(2024, 2, 15, 14, 30, 45)));

        assert!(RotationDuration::Monthly.same_period(&base, &at(2024, 1, 1, 0, 0, 0)));
        assert!(!RotationDuration::Monthly.same_period(&base, &at(2023, 1, 15, 14, 30, 45)));

        assert!(RotationDuration::Yearly.same_period(&base, &at(2024, 12, 31, 23, 59, 59)));
        assert!(!RotationDuration::Yearly.same_period(&base, &at(2025, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_weekly_uses_iso_weeks() {
        // 2024-12-30 (Monday) belongs to ISO week 1 of 2025
        let monday = at(2024, 12, 30, 0, 0, 0);
        assert!(RotationDuration::Weekly.same_period(&monday, &at(2025, 1, 5, 23, 0, 0)));
        assert!(!RotationDuration::Weekly.same_period(&monday, &at(2024, 12, 29, 23, 0, 0)));
    }

    #[test]
    fn test_same_period_reads_fields_in_given_zone() {
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
        let last = at(2024, 1, 15, 23, 30, 0);
        let now = at(2024, 1, 16, 0, 30, 0);

        // Different UTC days, same day on the New York calendar
        assert!(!RotationDuration::Daily.same_period(&last, &now));
        assert!(RotationDuration::Daily.same_period(
            &last.with_timezone(&new_york),
            &now.with_timezone(&new_york)
        ));

        let local_midnight = at(2024, 1, 16, 5, 0, 0).with_timezone(&new_york);
        assert!(!RotationDuration::Daily.same_period(&last.with_timezone(&new_york), &local_midnight));
    }

    #[test]
    fn test_size_threshold() {
        let options = RotationOptions::default();
        assert_eq!(options.size_threshold(), Some(DEFAULT_MAX_SIZE));
        assert_eq!(options.clone().with_max_size(10).size_threshold(), Some(10));
        assert_eq!(options.with_max_size(-1).size_threshold(), None);
    }

    #[test]
    fn test_mode_defaults() {
        let options = RotationOptions::default();
        assert_eq!(options.effective_file_mode(), 0o600);
        assert_eq!(options.effective_dir_mode(), 0o700);

        let options = RotationOptions::default().with_file_mode(0o640);
        assert_eq!(options.effective_dir_mode(), 0o740);

        let options = options.with_dir_mode(0o750);
        assert_eq!(options.effective_dir_mode(), 0o750);
    }

    #[test]
    fn test_entry_template() {
        let options = RotationOptions::default();
        assert_eq!(options.entry_template("app", ".log"), "%Y/%M/app_%Y%M%DT%h%m%sZ.log");

        let flat = options.with_history_path("");
        assert_eq!(flat.entry_template("app", ""), "app_%Y%M%DT%h%m%sZ");
    }

    #[test]
    fn test_default_history_dir() {
        let options = RotationOptions::default();
        assert_eq!(
            options.effective_history_dir(Path::new("/var/log/app.log")),
            PathBuf::from("/var/log/app.log.history")
        );
    }
}
