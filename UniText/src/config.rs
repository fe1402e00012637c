//! Tool configuration file (`unitext.toml`)
//!
//! Every section and field has a default, so a missing or partial file is
//! valid. Translation backends are configured by whoever implements
//! [`Translator`](crate::translate::Translator); no credentials live here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::inject::InjectOptions;
use crate::scanner::ScanOptions;
use crate::translate::TranslateOptions;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "unitext.toml";

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

/// Settings for every stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Root of the timestamped backup directories
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default)]
    pub scan: ScanOptions,
    #[serde(default)]
    pub inject: InjectOptions,
    #[serde(default)]
    pub translate: TranslateOptions,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            scan: ScanOptions::default(),
            inject: InjectOptions::default(),
            translate: TranslateOptions::default(),
        }
    }
}

impl ToolConfig {
    /// Read a configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = toml::from_str(&text)?;
        tracing::debug!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Read `path` if given, else `unitext.toml` in the working directory
    /// if present, else the defaults
    ///
    /// # Errors
    /// Returns an error if a file exists but cannot be parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE_NAME).is_file() => Self::load(CONFIG_FILE_NAME),
            None => Ok(Self::default()),
        }
    }

    /// Write the configuration as TOML
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
