//! Settings validation.
//!
//! # Responsibilities
//! - Semantic checks that serde cannot express
//! - Reject env var names the OS would refuse
//! - Reject unknown log levels before the subscriber is built
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: ControllerSettings → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::{AssetEnvMode, ControllerSettings};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A single semantic problem in the settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("assets.env_var must not be empty")]
    EmptyEnvVar,

    #[error("assets.env_var '{0}' contains '=' or NUL")]
    InvalidEnvVar(String),

    #[error("logging.level '{0}' is not one of trace, debug, info, warn, error, off")]
    UnknownLogLevel(String),

    #[error("links.allowed_domain must not be empty")]
    EmptyAllowedDomain,
}

/// Validate settings, collecting every error.
pub fn validate_settings(settings: &ControllerSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let env_var = &settings.assets.env_var;
    if settings.assets.mode != AssetEnvMode::Off {
        if env_var.is_empty() {
            errors.push(ValidationError::EmptyEnvVar);
        } else if env_var.contains('=') || env_var.contains('\0') {
            errors.push(ValidationError::InvalidEnvVar(env_var.clone()));
        }
    }

    let level = settings.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(settings.logging.level.clone()));
    }

    if settings.links.allowed_domain.trim().is_empty() {
        errors.push(ValidationError::EmptyAllowedDomain);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_settings(&ControllerSettings::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut settings = ControllerSettings::default();
        settings.assets.env_var = "A=B".into();
        settings.logging.level = "loud".into();
        settings.links.allowed_domain = "  ".into();

        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidEnvVar("A=B".into()),
                ValidationError::UnknownLogLevel("loud".into()),
                ValidationError::EmptyAllowedDomain,
            ]
        );
    }

    #[test]
    fn env_var_ignored_when_mode_off() {
        let mut settings = ControllerSettings::default();
        settings.assets.env_var = String::new();
        assert_eq!(
            validate_settings(&settings).unwrap_err(),
            vec![ValidationError::EmptyEnvVar]
        );

        settings.assets.mode = AssetEnvMode::Off;
        assert!(validate_settings(&settings).is_ok());
    }
}
