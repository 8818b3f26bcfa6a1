//! Subcommand handlers.
//!
//! Each handler loads what it needs from configuration, performs the
//! operation, and renders a payload through the [`OutputWriter`].
//!
//! [`OutputWriter`]: crate::output::OutputWriter

pub mod analyze;
pub mod config;

use std::path::Path;

use cisin_core::config::{CisinConfig, DEFAULT_CONFIG_PATH};

use crate::error::CliError;

/// Load configuration for a command.
///
/// Falls back to built-in defaults plus `CISIN_*` environment
/// variables when the default path does not exist, mirroring the
/// daemon's behavior.
pub async fn load_config(path: &Path) -> Result<CisinConfig, CliError> {
    if path.exists() {
        return CisinConfig::load(path)
            .await
            .map_err(|e| CliError::Config(e.to_string()));
    }

    if path == Path::new(DEFAULT_CONFIG_PATH) {
        return Ok(CisinConfig::from_env());
    }

    Err(CliError::Config(format!(
        "config file not found: {}",
        path.display()
    )))
}
