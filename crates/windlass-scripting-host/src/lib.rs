/// Host runtime for classifying and running window scripts
///
/// This crate owns the Lua interpreter, decides which scripts handle which
/// window events, runs them under a watchdog and keeps the classification up
/// to date while events keep arriving.
pub mod capability;
pub mod classifier;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod reload;
pub mod script_runner;
pub mod suppressor;
pub mod traceback;
pub mod watchdog;

pub use capability::{check_arity, CapabilityFn, CapabilityTable, CAPABILITY_API_VERSION};
pub use classifier::{classify, Classification, BOOTSTRAP_LISTS};
pub use config::{ConfigLoadError, LoggingConfig, ProjectPaths, ReplayConfig, ScriptingConfig,
    WindlassConfig,
};
pub use context::{ContextGuard, CurrentWindow};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use engine::{LoadedScript, ScriptEngine, DEFAULT_SCRIPT_TIMEOUT};
pub use error::{CapabilityError, ClassifyError, ScriptError, StartupError};
pub use reload::{classify_fs_event, setup_reload_signal_handler, ReloadMonitor, ScriptDirWatcher};
pub use script_runner::ScriptRunner;
pub use suppressor::TitleChangeFilter;
pub use watchdog::{Watchdog, WatchdogGuard, WatchdogProbe};
