use std::path::PathBuf;

/// Application name used for every per-user directory
pub const APP_NAME: &str = "windlass";

/// Platform-specific path handling that follows XDG Base Directory spec on Unix-like systems
/// and Windows conventions on Windows.
///
/// On macOS and Linux:
/// - Config: $XDG_CONFIG_HOME/{name} (default: ~/.config/{name})
/// - Data: $XDG_DATA_HOME/{name} (default: ~/.local/share/{name})
///
/// On Windows:
/// - Config: %APPDATA%\{name}
/// - Data: %LOCALAPPDATA%\{name}
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    name: String,
}

impl ProjectPaths {
    /// Create a new ProjectPaths instance for the given application name.
    pub fn new(name: &str) -> Option<Self> {
        // Verify we can get home directory before creating
        get_home_dir()?;
        Some(ProjectPaths {
            name: name.to_string(),
        })
    }

    /// Paths for windlass itself
    pub fn windlass() -> Option<Self> {
        Self::new(APP_NAME)
    }

    /// Directory holding `config.toml`, and by default the scripts
    pub fn config_dir(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            get_windows_dir("APPDATA")
                .map(|p| p.join(&self.name))
                .unwrap_or_else(|| PathBuf::from(format!(".{}", self.name)))
        }

        #[cfg(not(target_os = "windows"))]
        {
            xdg_dir("XDG_CONFIG_HOME", &[".config"], &self.name)
        }
    }

    /// Directory for log files
    pub fn data_dir(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            get_windows_dir("LOCALAPPDATA")
                .map(|p| p.join(&self.name))
                .unwrap_or_else(|| PathBuf::from(format!(".{}", self.name)))
        }

        #[cfg(not(target_os = "windows"))]
        {
            xdg_dir("XDG_DATA_HOME", &[".local", "share"], &self.name)
        }
    }
}

/// Get the home directory, respecting HOME and USERPROFILE environment variables.
fn get_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

/// `$var/{name}` when set and non-empty, else `~/{fallback}/{name}`
#[cfg(not(target_os = "windows"))]
fn xdg_dir(var: &str, fallback: &[&str], name: &str) -> PathBuf {
    let relative: PathBuf = fallback.iter().collect();
    std::env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| get_home_dir().map(|h| h.join(&relative)))
        .unwrap_or(relative)
        .join(name)
}

#[cfg(target_os = "windows")]
fn get_windows_dir(var: &str) -> Option<PathBuf> {
    std::env::var(var).ok().map(PathBuf::from)
}
