use super::models::Config;
use crate::rotation::RotationDuration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid rotation duration '{0}', expected one of Y, M, W, D, h, m")]
    InvalidDuration(String),

    #[error("No output path configured")]
    MissingOutput,

    #[error("Invalid {field}: {value:o} has bits outside 0o777")]
    InvalidMode { field: &'static str, value: u32 },
}

/// Validate the entire configuration
///
/// The output path is checked separately by [`require_output`] since it may
/// come from the command line.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    parse_duration(&config.rotation.duration)?;
    validate_modes(config)?;
    Ok(())
}

/// Duration code, or `None` when blank so the rotator falls back to monthly
pub fn parse_duration(duration: &str) -> Result<Option<RotationDuration>, ValidationError> {
    let code = duration.trim();
    if code.is_empty() {
        return Ok(None);
    }
    code.parse::<RotationDuration>()
        .map(Some)
        .map_err(|_| ValidationError::InvalidDuration(duration.to_string()))
}

/// Permission bits beyond rwx (setuid, sticky) are rejected for created files
fn validate_modes(config: &Config) -> Result<(), ValidationError> {
    let modes = [
        ("file_mode", config.rotation.file_mode),
        ("dir_mode", config.rotation.dir_mode),
    ];
    for (field, mode) in modes {
        if let Some(mode) = mode {
            if mode.bits() > 0o777 {
                return Err(ValidationError::InvalidMode {
                    field,
                    value: mode.bits(),
                });
            }
        }
    }
    Ok(())
}

pub fn require_output(config: &Config) -> Result<&std::path::Path, ValidationError> {
    config
        .output
        .path
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(ValidationError::MissingOutput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::FileMode;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_duration() {
        let mut config = Config::default();
        config.rotation.duration = "daily".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidDuration(d)) if d == "daily"
        ));
    }

    #[test]
    fn test_blank_duration_is_unset() {
        assert_eq!(parse_duration("").unwrap(), None);
        assert_eq!(parse_duration("  ").unwrap(), None);
        assert_eq!(parse_duration("W").unwrap(), Some(RotationDuration::Weekly));

        let mut config = Config::default();
        config.rotation.duration = String::new();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_special_bits() {
        let mut config = Config::default();
        config.rotation.dir_mode = Some(FileMode(0o4755));

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMode { field: "dir_mode", .. })
        ));
    }

    #[test]
    fn test_require_output() {
        let mut config = Config::default();
        assert!(matches!(
            require_output(&config),
            Err(ValidationError::MissingOutput)
        ));

        config.output.path = Some(PathBuf::from("app.log"));
        assert_eq!(require_output(&config).unwrap(), PathBuf::from("app.log"));
    }
}
