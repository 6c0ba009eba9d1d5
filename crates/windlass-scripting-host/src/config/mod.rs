pub mod paths;
pub mod scripting_config;
pub mod windlass_config;

pub use paths::ProjectPaths;
pub use scripting_config::ScriptingConfig;
pub use windlass_config::{ConfigLoadError, LoggingConfig, ReplayConfig, WindlassConfig};
