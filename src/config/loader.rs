//! Settings loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ControllerSettings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate settings from TOML text.
pub fn parse_settings(content: &str) -> Result<ControllerSettings, ConfigError> {
    let settings: ControllerSettings = toml::from_str(content)?;
    validate_settings(&settings).map_err(ConfigError::Validation)?;
    Ok(settings)
}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<ControllerSettings, ConfigError> {
    let content = fs::read_to_string(path)?;
    let settings = parse_settings(&content)?;
    tracing::debug!(path = %path.display(), "Controller settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AssetEnvMode;
    use std::io::Write;

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[assets]\nenv_var = \"MY_ASSETS\"\nmode = \"off\"\n\n[links]\nallowed_domain = \"example.org\""
        )
        .unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.assets.env_var, "MY_ASSETS");
        assert_eq!(settings.assets.mode, AssetEnvMode::Off);
        assert_eq!(settings.links.allowed_domain, "example.org");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = parse_settings("[assets\nmode = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_mode_is_parse_error() {
        let err = parse_settings("[assets]\nmode = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = parse_settings("[logging]\nlevel = \"loud\"\n[links]\nallowed_domain = \"\"")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Validation failed: "));
        assert!(msg.contains("loud"));
        assert!(msg.contains("allowed_domain"));
    }
}
