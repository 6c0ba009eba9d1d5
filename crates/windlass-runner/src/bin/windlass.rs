use anyhow::Context;
use tracing::{info, warn};

use windlass_runner::logging::init_logging;
use windlass_runner::{run_host, HostExit};
use windlass_scripting_host::{CapabilityTable, WindlassConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config_path = WindlassConfig::config_path();
    let config = match &config_path {
        Some(path) => WindlassConfig::load_or_default(path).context("Failed to load windlass config")?,
        None => WindlassConfig::default(),
    };
    let _log_guard = init_logging("windlass", &config.logging).context("Failed to set up logging")?;

    // Logging only exists from here on, so report the config source now
    match &config_path {
        Some(path) if path.exists() => info!(target: "runner", "Loaded config from {}", path.display()),
        Some(path) => info!(target: "runner", "No config file at {}, using defaults", path.display()),
        None => warn!(target: "runner", "Could not determine the config directory, using defaults"),
    }

    info!(target: "runner", "Starting windlass...");
    info!(
        target: "runner",
        "Using scripts in {}",
        config.scripting.script_dir().display()
    );

    match run_host(&config, CapabilityTable::with_builtins()).await? {
        HostExit::NoScripts(dir) => {
            println!(
                "No script files found in the script folder {} - exiting.",
                dir.display()
            );
        }
        HostExit::Stopped { .. } => info!(target: "runner", "windlass stopped"),
    }

    Ok(())
}
