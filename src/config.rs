use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

pub const DEFAULT_MAX_ROW_LIMIT: usize = 20;

/// Knobs that shape a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Caps the rows returned by row-oriented reads. Extra rows are dropped.
    pub max_row_limit: usize,
    /// Emit a per-stage trace instead of only the final payload.
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_row_limit: DEFAULT_MAX_ROW_LIMIT,
            debug_mode: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("polyq")
            .join("config.toml")
    }

    /// Defaults overlaid with the user's config file, if there is one.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(settings)
    }

    /// Applies one `key=value` option. Unknown keys are ignored.
    pub fn apply_option(&mut self, option: &str) -> Result<(), PipelineError> {
        let Some((key, value)) = option.split_once('=') else {
            return Err(PipelineError::InvalidOption(option.to_string()));
        };
        let value = value.trim();
        match key.trim() {
            "max_row_limit" => {
                self.max_row_limit = value
                    .parse()
                    .map_err(|_| PipelineError::InvalidOption(option.to_string()))?;
            }
            "debug_mode" => {
                self.debug_mode = match value.to_ascii_lowercase().as_str() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    _ => return Err(PipelineError::InvalidOption(option.to_string())),
                };
            }
            other => tracing::debug!(key = other, "ignoring unknown option"),
        }
        Ok(())
    }

    pub fn apply_options<I, S>(&mut self, options: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for option in options {
            self.apply_option(option.as_ref())?;
        }
        Ok(())
    }
}
