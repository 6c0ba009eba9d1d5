use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use windlass_events::{EventEnvelope, EventSource, ReloadReason};

use crate::classifier::{classify, Classification};
use crate::engine::ScriptEngine;
use crate::error::ClassifyError;

/// Owns the active classification and replaces it on reload
pub struct ReloadMonitor {
    bootstrap: PathBuf,
    publisher: watch::Sender<Arc<Classification>>,
}

impl ReloadMonitor {
    pub fn new(bootstrap: PathBuf, initial: Classification) -> Self {
        let (publisher, _) = watch::channel(Arc::new(initial));
        Self {
            bootstrap,
            publisher,
        }
    }

    /// Receiver handed to the dispatcher
    pub fn subscribe(&self) -> watch::Receiver<Arc<Classification>> {
        self.publisher.subscribe()
    }

    pub fn current(&self) -> Arc<Classification> {
        Arc::clone(&self.publisher.borrow())
    }

    pub fn bootstrap(&self) -> &Path {
        &self.bootstrap
    }

    pub fn script_dir(&self) -> &Path {
        self.bootstrap.parent().unwrap_or(Path::new("."))
    }

    /// Rebuild the classification from disk and publish it.
    ///
    /// On failure the previous classification stays active.
    pub fn reload(&self, engine: &ScriptEngine) -> Result<Arc<Classification>, ClassifyError> {
        engine.context().clear();

        let classification = match classify(&self.bootstrap, engine) {
            Ok(classification) => Arc::new(classification),
            Err(e) => {
                error!(target: "scripting", "Script reload failed, keeping previous lists: {}", e);
                return Err(e);
            }
        };

        if classification.is_empty() {
            warn!(
                target: "scripting",
                "Script reload found no scripts in {}",
                self.script_dir().display()
            );
        } else {
            info!(
                target: "scripting",
                "Reloaded {} script(s) - new lists:",
                classification.total()
            );
            classification.log_lists(self.script_dir());
        }

        self.publisher.send_replace(Arc::clone(&classification));
        Ok(classification)
    }
}

// ============================================================================
// Filesystem trigger
// ============================================================================

/// Decide whether a filesystem event in the scripts directory requires a reload
pub fn classify_fs_event(event: &notify::Event, bootstrap: &Path) -> Option<ReloadReason> {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            Some(ReloadReason::DirectoryChanged)
        }
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            let bootstrap_name = bootstrap.file_name()?;
            event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(bootstrap_name))
                .then_some(ReloadReason::BootstrapChanged)
        }
        _ => None,
    }
}

/// Keeps the scripts directory watched until dropped
pub struct ScriptDirWatcher {
    _watcher: RecommendedWatcher,
    script_dir: PathBuf,
}

impl ScriptDirWatcher {
    /// Watch the directory containing `bootstrap` and send a reload envelope to
    /// `tx` for every relevant change
    pub fn start(bootstrap: &Path, tx: mpsc::Sender<EventEnvelope>) -> notify::Result<Self> {
        let script_dir = bootstrap
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let watched_bootstrap = bootstrap.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let Some(reason) = classify_fs_event(&event, &watched_bootstrap) else {
                        return;
                    };
                    debug!(target: "scripting", "Scripts changed ({:?}): {:?}", reason, event.paths);
                    // Runs on the notifier's own thread, outside the runtime
                    let envelope = EventEnvelope::reload(reason, EventSource::FileSystem);
                    if tx.blocking_send(envelope).is_err() {
                        debug!(target: "scripting", "Event loop gone, dropping filesystem change");
                    }
                }
                Err(e) => warn!(target: "scripting", "File watcher error: {}", e),
            },
            NotifyConfig::default(),
        )?;

        watcher.watch(&script_dir, RecursiveMode::NonRecursive)?;
        info!(target: "scripting", "Watching {} for script changes", script_dir.display());

        Ok(Self {
            _watcher: watcher,
            script_dir,
        })
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }
}

// ============================================================================
// Signal trigger
// ============================================================================

/// Spawn a task turning SIGUSR2 into reload envelopes on `tx`
#[cfg(unix)]
pub fn setup_reload_signal_handler(tx: mpsc::Sender<EventEnvelope>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigusr2 = match signal(SignalKind::user_defined2()) {
            Ok(s) => s,
            Err(e) => {
                error!(target: "scripting", "Failed to register SIGUSR2 handler: {}", e);
                return;
            }
        };

        while sigusr2.recv().await.is_some() {
            info!(target: "scripting", "Received SIGUSR2 - triggering script reload");

            let envelope = EventEnvelope::reload(ReloadReason::Manual, EventSource::Signal);
            if tx.send(envelope).await.is_err() {
                info!(target: "scripting", "Event loop gone, shutting down SIGUSR2 handler");
                break;
            }
        }
    });
}

/// Non-Unix platforms don't support SIGUSR2
#[cfg(not(unix))]
pub fn setup_reload_signal_handler(_tx: mpsc::Sender<EventEnvelope>) {
    warn!(target: "scripting", "SIGUSR2 reload not supported on this platform");
}
