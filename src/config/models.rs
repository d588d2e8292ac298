use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Placeholder in `rotation.history_dir` replaced by the output path
pub const OUT_PLACEHOLDER: &str = "{out}";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub listen: ListenConfig,
}

/// Where rotated output goes
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Active log file
    pub path: Option<PathBuf>,
    /// Do not echo `write` input to stdout
    #[serde(default)]
    pub silent: bool,
}

/// Rotation policy, see `RotationOptions` for semantics
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RotationConfig {
    #[serde(default = "default_history_dir")]
    pub history_dir: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
    /// One of `Y`, `M`, `W`, `D`, `h`, `m`; blank means monthly
    #[serde(default = "default_duration")]
    pub duration: String,
    /// `0` uses the built-in threshold, negative disables size rotation
    #[serde(default)]
    pub max_size: ByteSize,
    /// `0` or less keeps every entry
    #[serde(default)]
    pub history_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<FileMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_mode: Option<FileMode>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            history_dir: default_history_dir(),
            history_path: default_history_path(),
            duration: default_duration(),
            max_size: ByteSize::default(),
            history_count: 0,
            file_mode: None,
            dir_mode: None,
        }
    }
}

fn default_history_dir() -> String {
    format!("{}.history", OUT_PLACEHOLDER)
}

fn default_history_path() -> String {
    crate::rotation::template::DEFAULT_HISTORY_PATH.to_string()
}

fn default_duration() -> String {
    "M".to_string()
}

/// Network listeners feeding the rotator
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub tcp: Vec<SocketAddr>,
    #[serde(default)]
    pub udp: Vec<SocketAddr>,
    #[serde(default)]
    pub http: Vec<SocketAddr>,
}

impl ListenConfig {
    pub fn is_empty(&self) -> bool {
        self.tcp.is_empty() && self.udp.is_empty() && self.http.is_empty()
    }
}

/// Unix permission bits
///
/// Integers are taken as-is (`0o640` in TOML). Strings are always octal,
/// with or without a `0`/`0o` prefix, so `"640"` and `"0640"` agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode(pub u32);

impl FileMode {
    pub const MAX: u32 = 0o7777;

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl FromStr for FileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0o")
            .or_else(|| trimmed.strip_prefix("0O"))
            .unwrap_or(trimmed);
        let bits = u32::from_str_radix(digits, 8)
            .map_err(|_| format!("'{}' is not an octal mode", s))?;
        if bits > Self::MAX {
            return Err(format!("mode {:o} exceeds {:o}", bits, Self::MAX));
        }
        Ok(FileMode(bits))
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0{:o}", self.0)
    }
}

impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct FileModeVisitor;

        impl<'de> serde::de::Visitor<'de> for FileModeVisitor {
            type Value = FileMode;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a permission mode as integer or octal string (e.g., \"0640\")")
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::try_from(v)
                    .ok()
                    .filter(|bits| *bits <= FileMode::MAX)
                    .map(FileMode)
                    .ok_or_else(|| E::custom(format!("mode {} out of range", v)))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::try_from(v)
                    .ok()
                    .filter(|bits| *bits <= FileMode::MAX)
                    .map(FileMode)
                    .ok_or_else(|| E::custom(format!("mode {} out of range", v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<FileMode>().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(FileModeVisitor)
    }
}

impl Serialize for FileMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_mode_from_str() {
        assert_eq!("640".parse::<FileMode>().unwrap(), FileMode(0o640));
        assert_eq!("0640".parse::<FileMode>().unwrap(), FileMode(0o640));
        assert_eq!("0o750".parse::<FileMode>().unwrap(), FileMode(0o750));
        assert!("0890".parse::<FileMode>().is_err());
        assert!("77777".parse::<FileMode>().is_err());
    }

    #[test]
    fn test_file_mode_from_toml() {
        #[derive(Deserialize)]
        struct Modes {
            int: FileMode,
            text: FileMode,
        }

        let modes: Modes = toml::from_str("int = 0o640\ntext = \"0750\"").unwrap();
        assert_eq!(modes.int.bits(), 0o640);
        assert_eq!(modes.text.bits(), 0o750);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rotation.history_dir, "{out}.history");
        assert_eq!(config.rotation.history_path, "%Y/%M");
        assert_eq!(config.rotation.duration, "M");
        assert_eq!(config.rotation.max_size.as_i64(), 0);
        assert!(config.listen.is_empty());
        assert!(!config.output.silent);
    }
}
