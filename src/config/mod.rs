//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! Controller settings (TOML):
//!     settings file
//!         → loader.rs (parse & deserialize)
//!         → validation.rs (semantic checks)
//!         → ControllerSettings (validated, immutable)
//!
//! Runtime document (JSON):
//!     document text
//!         → document.rs asset_hint (best effort, never fails)
//!         → document.rs DocumentLoader (parse + structural checks)
//!         → RuntimeDocument handed to the runtime factory
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; no hot reload
//! - All settings fields have defaults to allow minimal files
//! - The runtime document is owned by the runtime; only the parts the
//!   controller needs are typed

pub mod document;
pub mod loader;
pub mod schema;
pub mod validation;

pub use document::{asset_hint, DocumentError, DocumentLoader, RuntimeDocument};
pub use loader::{load_settings, parse_settings, ConfigError};
pub use schema::{AssetEnvMode, AssetSettings, ControllerSettings, LinkSettings, LogFormat, LoggingSettings};
