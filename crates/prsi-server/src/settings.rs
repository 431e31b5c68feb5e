//! The configuration file and how command-line flags override it.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:3750"
//! max_rooms = 20
//!
//! [logging]
//! level = "debug"
//! json = false
//! ```
//!
//! Both tables and every key are optional.

use std::path::{Path, PathBuf};

use prsi::ServerConfig;
use serde::Deserialize;

use crate::cli::Cli;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive. `RUST_LOG` wins over it.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &content)
    }

    /// Loads the file named on the command line, if any, and applies the
    /// flags on top.
    pub fn resolve(cli: &Cli) -> Result<Self, SettingsError> {
        let mut settings = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply(cli);
        Ok(settings)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind {
            self.server.bind_address = bind.clone();
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
        if cli.json_logs {
            self.logging.json = true;
        }
    }
}
