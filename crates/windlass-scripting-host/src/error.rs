use std::path::PathBuf;

use thiserror::Error;

/// Failure while loading or running a single script
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script did not compile
    #[error("{message}")]
    Load { path: PathBuf, message: String },

    /// The script raised an error while running; `message` carries the backtrace
    /// when one was collected
    #[error("{message}")]
    Runtime { path: PathBuf, message: String },

    /// The watchdog fired before the script returned
    #[error("{location}: script timed out")]
    Timeout { path: PathBuf, location: String },

    /// The interpreter itself failed outside of script code
    #[error("script engine error: {0}")]
    Engine(#[from] mlua::Error),
}

impl ScriptError {
    /// Path of the script the error belongs to, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ScriptError::Io { path, .. }
            | ScriptError::Load { path, .. }
            | ScriptError::Runtime { path, .. }
            | ScriptError::Timeout { path, .. } => Some(path),
            ScriptError::Engine(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ScriptError::Timeout { .. })
    }
}

/// Failure while building a classification from the scripts directory
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("script folder isn't a folder: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("failed to read script folder {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bootstrap script failed to load or raised an error
    #[error("bootstrap {} failed: {message}", path.display())]
    Bootstrap { path: PathBuf, message: String },
}

/// Failure while building the capability table
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("alias {alias} refers to unknown capability {canonical}")]
    UnknownCanonical {
        alias: &'static str,
        canonical: &'static str,
    },

    #[error("capability {0} is already registered")]
    Duplicate(&'static str),
}

/// Failure while bringing up the scripting host
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create script engine: {0}")]
    Engine(#[from] mlua::Error),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("No script files found in the script folder {}", .0.display())]
    NoScripts(PathBuf),
}
