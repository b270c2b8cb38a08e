//! Controller settings schema.
//!
//! Settings are read from a TOML file. Every field has a default so an
//! empty file (or no file at all) yields a working controller.

use serde::{Deserialize, Serialize};

/// Environment variable the proxy runtime reads its asset directory from.
pub const DEFAULT_ASSET_ENV_VAR: &str = "XRAY_LOCATION_ASSET";

/// Domain share links and subscriptions must belong to.
pub const DEFAULT_ALLOWED_DOMAIN: &str = "persiangames.online";

/// Root settings for the controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ControllerSettings {
    /// Asset directory propagation.
    pub assets: AssetSettings,

    /// Log level and output format.
    pub logging: LoggingSettings,

    /// Share-link acceptance policy.
    pub links: LinkSettings,
}

/// How the asset-directory hint reaches the runtime.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AssetSettings {
    /// Name of the environment variable to write.
    pub env_var: String,

    /// Whether and for how long the variable is written.
    pub mode: AssetEnvMode,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            env_var: DEFAULT_ASSET_ENV_VAR.to_string(),
            mode: AssetEnvMode::Persist,
        }
    }
}

/// Environment-variable policy for the asset hint.
///
/// The hint is always passed to the factory through `BuildContext`;
/// this only controls the additional process-wide channel.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetEnvMode {
    /// Set before loading and never restored.
    #[default]
    Persist,
    /// Set before loading, restored on stop or failed start.
    Scoped,
    /// Never touch the process environment.
    Off,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Share-link policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LinkSettings {
    /// Hosts must equal this domain or be a subdomain of it.
    pub allowed_domain: String,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            allowed_domain: DEFAULT_ALLOWED_DOMAIN.to_string(),
        }
    }
}
