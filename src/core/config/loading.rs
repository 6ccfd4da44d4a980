//! Reads the JSON configuration file from disk.

use super::file::ConfigFile;
use crate::core::error::{AppError, Result};
use std::fs;
use std::path::Path;

/// Parses the configuration file at `path`.
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    tracing::debug!("Reading configuration at {}", path.display());

    let contents = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents).map_err(|e| match e {
        AppError::Json(err) => AppError::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            err
        )),
        other => other,
    })
}

pub(crate) fn parse_config(contents: &str) -> Result<ConfigFile> {
    let file: ConfigFile = serde_json::from_str(contents)?;
    for key in file.unknown.keys() {
        tracing::warn!("Ignoring unrecognized config key '{}'", key);
    }
    Ok(file)
}
