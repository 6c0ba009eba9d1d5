use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::paths::ProjectPaths;

/// Bootstrap file name looked up inside the scripts directory
pub const DEFAULT_BOOTSTRAP_FILE: &str = "windlass.lua";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptingConfig {
    /// Directory containing scripts (default: ~/.config/windlass)
    #[serde(default)]
    pub script_dir: Option<PathBuf>,

    /// Name of the bootstrap file inside the scripts directory
    #[serde(default = "default_bootstrap_file")]
    pub bootstrap_file: String,

    /// Wall-clock budget of a single script run in milliseconds (default: 5000)
    #[serde(default = "default_script_timeout_ms")]
    pub script_timeout_ms: u64,

    /// Whether hot reload is enabled (default: true)
    #[serde(default = "default_hot_reload")]
    pub hot_reload: bool,
}

fn default_bootstrap_file() -> String {
    DEFAULT_BOOTSTRAP_FILE.to_string()
}

fn default_script_timeout_ms() -> u64 {
    5000
}

fn default_hot_reload() -> bool {
    true
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            script_dir: None,
            bootstrap_file: default_bootstrap_file(),
            script_timeout_ms: default_script_timeout_ms(),
            hot_reload: default_hot_reload(),
        }
    }
}

impl ScriptingConfig {
    /// Get the script directory path (use provided or default)
    pub fn script_dir(&self) -> PathBuf {
        self.script_dir.clone().unwrap_or_else(|| {
            ProjectPaths::windlass()
                .map(|p| p.config_dir())
                .unwrap_or_else(|| PathBuf::from(".windlass"))
        })
    }

    /// Full path of the bootstrap file
    pub fn bootstrap_path(&self) -> PathBuf {
        self.script_dir().join(&self.bootstrap_file)
    }

    /// Timeout of a single run; zero is raised to one millisecond
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_uses_defaults() {
        let config: ScriptingConfig = toml::from_str("").unwrap();
        assert_eq!(config, ScriptingConfig::default());
        assert_eq!(config.script_timeout(), Duration::from_secs(5));
        assert!(config.hot_reload);
    }

    #[test]
    fn test_bootstrap_path_joins_script_dir() {
        let config: ScriptingConfig = toml::from_str(
            r#"
            script_dir = "/etc/windlass/scripts"
            bootstrap_file = "rules.lua"
            script_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(
            config.bootstrap_path(),
            PathBuf::from("/etc/windlass/scripts/rules.lua")
        );
        assert_eq!(config.script_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = ScriptingConfig {
            script_timeout_ms: 0,
            ..ScriptingConfig::default()
        };
        assert_eq!(config.script_timeout(), Duration::from_millis(1));
    }
}
