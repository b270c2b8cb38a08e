//! Asset-location environment handling.
//!
//! The wrapped runtime may read its asset directory from a process
//! environment variable. How (and whether) the controller writes that
//! variable is governed by [`AssetEnvMode`].

use std::ffi::OsString;
use std::path::Path;

use crate::config::schema::AssetEnvMode;

/// Restores an environment variable to its previous value when dropped.
#[derive(Debug)]
pub struct EnvOverride {
    key: String,
    previous: Option<OsString>,
}

impl EnvOverride {
    /// Set `key` to `value`, remembering the current value.
    pub fn set(key: &str, value: &Path) -> Self {
        let previous = std::env::var_os(key);
        std::env::set_var(key, value);
        Self {
            key: key.to_string(),
            previous,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => std::env::set_var(&self.key, value),
            None => std::env::remove_var(&self.key),
        }
        tracing::trace!(key = %self.key, "Asset environment override restored");
    }
}

/// Apply the asset hint according to `mode`.
///
/// Returns a guard only in `Scoped` mode. In `Persist` mode the variable is
/// left set for the life of the process (or until the next start overwrites it).
pub fn apply_asset_hint(mode: AssetEnvMode, key: &str, dir: &Path) -> Option<EnvOverride> {
    match mode {
        AssetEnvMode::Off => None,
        AssetEnvMode::Persist => {
            std::env::set_var(key, dir);
            tracing::debug!(key = %key, dir = %dir.display(), "Asset directory exported");
            None
        }
        AssetEnvMode::Scoped => {
            tracing::debug!(key = %key, dir = %dir.display(), "Asset directory exported for session");
            Some(EnvOverride::set(key, dir))
        }
    }
}
