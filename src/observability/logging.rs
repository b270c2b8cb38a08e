//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for embedding applications
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - JSON format for production, pretty format for development
//! - Initialising twice is not an error; the first subscriber stays

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, LoggingSettings};

/// Install a global subscriber built from `settings`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gozar_core={}", settings.level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match settings.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    match result {
        Ok(()) => {
            tracing::debug!(level = %settings.level, format = ?settings.format, "Logging initialised");
            true
        }
        Err(_) => false,
    }
}
