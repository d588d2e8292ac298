use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LOGBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "logbox.toml";
const ENV_PREFIX: &str = "LOGBOX";
const ENV_SEPARATOR: &str = "__";
const LIST_KEYS: [&str; 3] = ["listen.tcp", "listen.udp", "listen.http"];

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    load_from_sources(default_path())
}

/// Config file named by `LOGBOX_CONFIG`, else `logbox.toml`
pub fn default_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // LOGBOX__ROTATION__MAX_SIZE -> rotation.max_size
    // LOGBOX__LISTEN__TCP=127.0.0.1:5140,127.0.0.1:5141 -> listen.tcp
    let mut environment = Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .list_separator(",");
    for key in LIST_KEYS {
        environment = environment.with_list_parse_key(key);
    }
    builder = builder.add_source(environment);

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.rotation.history_path, "%Y/%M");
        assert_eq!(config.rotation.duration, "M");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[output]
path = "/var/log/app.log"
silent = true

[rotation]
history_dir = "/var/log/history/{out}"
history_path = "%Y/%M/%D"
duration = "D"
max_size = "50M"
history_count = 14
file_mode = 0o640
dir_mode = "0750"

[listen]
tcp = ["127.0.0.1:5140"]
http = ["127.0.0.1:8080", "[::1]:8080"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(
            config.output.path.as_deref(),
            Some(std::path::Path::new("/var/log/app.log"))
        );
        assert!(config.output.silent);
        assert_eq!(config.rotation.history_path, "%Y/%M/%D");
        assert_eq!(config.rotation.max_size.as_i64(), 50_000_000);
        assert_eq!(config.rotation.history_count, 14);
        assert_eq!(config.rotation.file_mode.unwrap().bits(), 0o640);
        assert_eq!(config.rotation.dir_mode.unwrap().bits(), 0o750);
        assert_eq!(config.listen.tcp.len(), 1);
        assert_eq!(config.listen.http.len(), 2);
        assert!(config.listen.udp.is_empty());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[rotation\nduration = ").unwrap();

        assert!(load_from_sources(config_path).is_err());
    }
}
