use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::paths::ProjectPaths;
use super::scripting_config::ScriptingConfig;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Config file not found")]
    NotFound,
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("IO error reading config: {0}")]
    IoError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file under the data directory
    #[serde(default)]
    pub file: bool,

    /// `EnvFilter` directives used when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: false,
            filter: default_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Read replay commands from standard input (default: true)
    #[serde(default = "default_stdin")]
    pub stdin: bool,

    /// Shut down when standard input ends instead of waiting for other
    /// sources (default: false)
    #[serde(default)]
    pub exit_at_eof: bool,
}

fn default_stdin() -> bool {
    true
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            stdin: default_stdin(),
            exit_at_eof: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindlassConfig {
    /// Scripting configuration
    #[serde(default)]
    pub scripting: ScriptingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

impl WindlassConfig {
    pub fn config_path() -> Option<PathBuf> {
        ProjectPaths::windlass().map(|p| p.config_dir().join("config.toml"))
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigLoadError> {
        let path = Self::config_path().ok_or(ConfigLoadError::NotFound)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let config =
            toml::from_str(&content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigLoadError> {
        match Self::load_from(path) {
            Err(ConfigLoadError::NotFound) => Ok(Self::default()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        assert!(matches!(
            WindlassConfig::load_from(&path),
            Err(ConfigLoadError::NotFound)
        ));
        assert_eq!(
            WindlassConfig::load_or_default(&path).unwrap(),
            WindlassConfig::default()
        );
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[scripting]\nhot_reload = false\n\n[logging]\nfile = true\n",
        )
        .unwrap();

        let config = WindlassConfig::load_from(&path).unwrap();
        assert!(!config.scripting.hot_reload);
        assert_eq!(config.scripting.bootstrap_file, "windlass.lua");
        assert!(config.logging.file);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.replay, ReplayConfig::default());
        assert!(!config.replay.exit_at_eof);
    }

    #[test]
    fn test_replay_section() {
        let config: WindlassConfig =
            toml::from_str("[replay]\nstdin = false\nexit_at_eof = true\n").unwrap();
        assert!(!config.replay.stdin);
        assert!(config.replay.exit_at_eof);
    }

    #[test]
    fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scripting\n").unwrap();

        assert!(matches!(
            WindlassConfig::load_from(&path),
            Err(ConfigLoadError::ParseError(_))
        ));
    }
}
