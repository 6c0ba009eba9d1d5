use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use windlass_scripting_host::{
    setup_reload_signal_handler, CapabilityTable, ScriptDirWatcher, ScriptRunner, StartupError,
    WindlassConfig,
};

use crate::event_consumer::LoggingConsumer;
use crate::event_loop::{EventLoop, EVENT_CHANNEL_CAPACITY};
use crate::replay::spawn_stdin_replay;

/// How a host run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostExit {
    /// The event loop ran and stopped
    Stopped { events: usize },
    /// The scripts directory had nothing to run
    NoScripts(PathBuf),
}

/// Start the scripting host with the given capabilities and run the event loop
/// on the current task until shutdown.
pub async fn run_host(config: &WindlassConfig, capabilities: CapabilityTable) -> anyhow::Result<HostExit> {
    let runner = match ScriptRunner::new(&config.scripting, capabilities) {
        Ok(runner) => runner,
        Err(StartupError::NoScripts(dir)) => return Ok(HostExit::NoScripts(dir)),
        Err(e) => return Err(anyhow::anyhow!(e.to_string())).context("Failed to start the scripting host"),
    };

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    // Dropping the watcher stops it, so keep it for the life of the loop
    let _watcher = if config.scripting.hot_reload {
        match ScriptDirWatcher::start(runner.bootstrap_path(), tx.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(target: "runner", "Hot reload disabled, failed to watch scripts: {}", e);
                None
            }
        }
    } else {
        None
    };

    setup_reload_signal_handler(tx.clone());
    if config.replay.stdin {
        spawn_stdin_replay(tx, config.replay.exit_at_eof);
    }

    let mut event_loop = EventLoop::new(rx);
    event_loop.add_consumer(Box::new(LoggingConsumer::new()));
    event_loop.add_consumer(Box::new(runner));

    let events = event_loop.run().await;
    info!(target: "runner", "Event loop stopped after {} event(s)", events);
    Ok(HostExit::Stopped { events })
}
