//! `config` subcommand: validate the configuration file.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::load_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

#[derive(Debug, Serialize)]
struct ValidationResult {
    config_path: String,
    valid: bool,
    error: Option<String>,
}

impl Render for ValidationResult {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.valid {
            writeln!(w, "{}: configuration OK", self.config_path)
        } else {
            writeln!(
                w,
                "{}: invalid configuration: {}",
                self.config_path,
                self.error.as_deref().unwrap_or("unknown"),
            )
        }
    }
}

/// Run a `config` subcommand.
pub async fn run(
    command: ConfigCommands,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Validate => validate(config_path, writer).await,
    }
}

async fn validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let result = match load_config(config_path).await {
        Ok(config) => match config.validate() {
            Ok(()) => ValidationResult {
                config_path: config_path.display().to_string(),
                valid: true,
                error: None,
            },
            Err(e) => ValidationResult {
                config_path: config_path.display().to_string(),
                valid: false,
                error: Some(e.to_string()),
            },
        },
        Err(e) => ValidationResult {
            config_path: config_path.display().to_string(),
            valid: false,
            error: Some(e.to_string()),
        },
    };

    let valid = result.valid;
    writer.render(&result)?;

    if !valid {
        return Err(CliError::Config(
            result.error.unwrap_or_else(|| "invalid configuration".to_owned()),
        ));
    }

    Ok(())
}
