use crate::parser::DEFAULT_MARKER;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "result-csv.toml";

/// Top-level configuration loaded from result-csv.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ToolConfig {
    pub input: InputConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Prefix that marks a result line.
    pub marker: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub delimiter: char,
    /// Print the final dataset to stdout after the CSV is written.
    pub echo_dataset: bool,
}

// --- Default implementations ---

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            echo_dataset: true,
        }
    }
}

impl ExportConfig {
    /// The delimiter as the single byte the CSV writer expects.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        delimiter_byte(self.delimiter)
    }
}

/// Validate a delimiter character: it must be a single ASCII byte.
pub fn delimiter_byte(delimiter: char) -> Result<u8, ConfigError> {
    if delimiter.is_ascii() && delimiter != '"' && delimiter != '\n' && delimiter != '\r' {
        Ok(delimiter as u8)
    } else {
        Err(ConfigError::Delimiter { delimiter })
    }
}

/// Load the config file at `path`.
///
/// A missing file yields the defaults unless `required` is set, which is the
/// case when the path was passed explicitly on the command line.
pub fn load(path: &Path, required: bool) -> Result<ToolConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(ToolConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let config: ToolConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.export.delimiter_byte()?;

    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Delimiter {
        delimiter: char,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
            ConfigError::Delimiter { delimiter } => {
                write!(f, "unusable CSV delimiter {delimiter:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Delimiter { .. } => None,
        }
    }
}
