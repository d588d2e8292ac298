//! Configuration management for logbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use logbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Rotating every: {}", config.rotation.duration);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `LOGBOX__<section>__<key>`
//!
//! Examples:
//! - `LOGBOX__OUTPUT__PATH=/var/log/app.log`
//! - `LOGBOX__ROTATION__MAX_SIZE=50M`
//! - `LOGBOX__ROTATION__FILE_MODE=0o640`
//! - `LOGBOX__LISTEN__TCP=127.0.0.1:5140,127.0.0.1:5141`
//!
//! Octal modes from the environment need the `0o` prefix; bare digits are
//! parsed as a decimal integer before they reach the mode parser.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `logbox.toml`.
//! This can be overridden using the `LOGBOX_CONFIG` environment variable.

mod models;
mod sources;
pub mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, FileMode, ListenConfig, OUT_PLACEHOLDER, OutputConfig, RotationConfig,
};
pub use validation::ValidationError;

use crate::rotation::RotationOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`LOGBOX__*`)
    /// 2. TOML file (default: `logbox.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (unknown duration code, bad modes)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides still apply.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Configured output file
    pub fn output_path(&self) -> Result<&Path, ConfigError> {
        Ok(validation::require_output(self)?)
    }

    /// History root with `{out}` replaced by the output path
    pub fn history_dir(&self) -> Result<PathBuf, ConfigError> {
        let out = self.output_path()?;
        let dir = self
            .rotation
            .history_dir
            .replace(OUT_PLACEHOLDER, &out.to_string_lossy());
        Ok(PathBuf::from(dir))
    }

    /// Resolve into rotator options
    pub fn rotation_options(&self) -> Result<RotationOptions, ConfigError> {
        let rotation = &self.rotation;
        let duration = validation::parse_duration(&rotation.duration)?;

        let mut options = RotationOptions::default()
            .with_history_dir(self.history_dir()?)
            .with_history_path(rotation.history_path.clone())
            .with_max_size(rotation.max_size.as_i64())
            .with_history_count(rotation.history_count);
        if let Some(duration) = duration {
            options = options.with_duration(duration);
        }
        if let Some(mode) = rotation.file_mode {
            options = options.with_file_mode(mode.bits());
        }
        if let Some(mode) = rotation.dir_mode {
            options = options.with_dir_mode(mode.bits());
        }
        Ok(options)
    }

    /// Render the resolved configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::RotationDuration;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[output]
path = "app.log"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.output_path().unwrap(), Path::new("app.log"));
        assert_eq!(config.history_dir().unwrap(), PathBuf::from("app.log.history"));
    }

    #[test]
    fn test_validation_catches_bad_duration() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[rotation]
duration = "X"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_rotation_options() {
        let config: Config = toml::from_str(
            r#"
[output]
path = "/srv/app.log"

[rotation]
history_dir = "/archive/{out}/old"
history_path = "%Y"
duration = "h"
max_size = "2K"
history_count = 3
file_mode = "0640"
            "#,
        )
        .unwrap();

        let options = config.rotation_options().unwrap();
        assert_eq!(
            options.history_dir,
            Some(PathBuf::from("/archive//srv/app.log/old"))
        );
        assert_eq!(options.history_path, "%Y");
        assert_eq!(options.duration, Some(RotationDuration::Hourly));
        assert_eq!(options.max_size, 2_000);
        assert_eq!(options.history_count, 3);
        assert_eq!(options.file_mode, Some(0o640));
        assert_eq!(options.dir_mode, None);
        assert_eq!(options.effective_dir_mode(), 0o740);
    }

    #[test]
    fn test_empty_duration_rotates_monthly() {
        let config: Config = toml::from_str(
            r#"
[output]
path = "app.log"

[rotation]
duration = ""
            "#,
        )
        .unwrap();

        validation::validate(&config).unwrap();
        let options = config.rotation_options().unwrap();
        assert_eq!(options.duration, None);
        assert_eq!(options.effective_duration(), RotationDuration::Monthly);
    }

    #[test]
    fn test_rotation_options_require_output() {
        let config = Config::default();
        assert!(matches!(
            config.rotation_options(),
            Err(ConfigError::ValidationError(ValidationError::MissingOutput))
        ));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut config = Config::default();
        config.output.path = Some(PathBuf::from("app.log"));
        config.rotation.file_mode = Some(FileMode(0o640));

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("file_mode = \"0640\""));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.rotation.file_mode, Some(FileMode(0o640)));
        assert_eq!(parsed.output.path, config.output.path);
    }
}
