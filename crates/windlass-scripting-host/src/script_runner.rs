use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use windlass_events::{
    EventCategory, EventConsumer, EventEnvelope, EventType, ReloadReason, SystemEvent, WindowEvent,
    WindowId, WindowRef,
};

use crate::capability::CapabilityTable;
use crate::classifier::{classify, Classification};
use crate::config::ScriptingConfig;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::engine::ScriptEngine;
use crate::error::StartupError;
use crate::reload::ReloadMonitor;
use crate::suppressor::TitleChangeFilter;

/// Routes window and system events to the scripts
pub struct ScriptRunner {
    engine: ScriptEngine,
    monitor: ReloadMonitor,
    dispatcher: Dispatcher,
    title_filter: TitleChangeFilter,
    /// Windows whose title edits are dispatched
    title_watches: HashSet<WindowId>,
}

impl ScriptRunner {
    /// Create the engine and build the initial classification.
    ///
    /// Fails with [`StartupError::NoScripts`] when the scripts directory has
    /// nothing to run.
    pub fn new(config: &ScriptingConfig, capabilities: CapabilityTable) -> Result<Self, StartupError> {
        let engine = ScriptEngine::with_timeout(&capabilities, config.script_timeout())?;
        let bootstrap = config.bootstrap_path();
        let script_dir = config.script_dir();

        debug!(target: "scripting", "Loading scripts from {}", script_dir.display());
        let classification = classify(&bootstrap, &engine)?;
        if classification.is_empty() {
            return Err(StartupError::NoScripts(script_dir));
        }

        info!(target: "scripting", "Loaded {} script(s)", classification.total());
        classification.log_lists(&script_dir);

        let monitor = ReloadMonitor::new(bootstrap, classification);
        let dispatcher = Dispatcher::new(monitor.subscribe());

        Ok(Self {
            engine,
            monitor,
            dispatcher,
            title_filter: TitleChangeFilter::new(),
            title_watches: HashSet::new(),
        })
    }

    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    /// Active classification
    pub fn classification(&self) -> Arc<Classification> {
        self.monitor.current()
    }

    pub fn bootstrap_path(&self) -> &Path {
        self.monitor.bootstrap()
    }

    pub fn is_title_watched(&self, window: WindowId) -> bool {
        self.title_watches.contains(&window)
    }

    /// Dispatch the scripts a window notification calls for
    pub fn handle_window_event(&mut self, event: WindowEvent) -> DispatchReport {
        debug!(target: "scripting", "Window event received: {}", event.kind());

        match event {
            WindowEvent::Opened(window) => self.dispatch(EventCategory::Creation, window),
            WindowEvent::Closed(window) => {
                self.title_watches.remove(&window.id());
                self.dispatch(EventCategory::Destruction, window)
            }
            WindowEvent::ActiveChanged { previous, current } => self.focus_changed(previous, current),
            WindowEvent::TitleChanged { window, title } => {
                if !self.title_watches.contains(&window.id()) {
                    return DispatchReport::default();
                }
                if !self.title_filter.should_dispatch_title_change(window.id(), &title) {
                    debug!(target: "scripting", "Ignoring repeated title change for {}", window.id());
                    return DispatchReport::default();
                }
                self.dispatch(EventCategory::TitleChanged, window)
            }
        }
    }

    /// Blur the previous window, focus the new one, then start watching its title
    fn focus_changed(
        &mut self,
        previous: Option<WindowRef>,
        current: Option<WindowRef>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        if let Some(previous) = previous {
            report += self.dispatch(EventCategory::FocusLost, previous);
        }

        if let Some(current) = current {
            let id = current.id();
            report += self.dispatch(EventCategory::FocusGained, current);
            if self.title_watches.insert(id) {
                debug!(target: "scripting", "Watching title of window {}", id);
            }
        }

        report
    }

    fn dispatch(&self, category: EventCategory, window: WindowRef) -> DispatchReport {
        self.dispatcher.dispatch(&self.engine, category, window)
    }

    /// Rebuild the classification; returns whether a new one was published
    pub fn reload(&mut self, reason: ReloadReason) -> bool {
        info!(target: "scripting", "Reloading scripts ({:?})", reason);
        self.monitor.reload(&self.engine).is_ok()
    }
}

impl EventConsumer for ScriptRunner {
    fn handle_event(&mut self, envelope: EventEnvelope) {
        match envelope.event {
            EventType::Window(event) => {
                let report = self.handle_window_event(event);
                if report.failed > 0 {
                    debug!(
                        target: "scripting",
                        "{} of {} script(s) failed",
                        report.failed,
                        report.attempted()
                    );
                }
            }
            EventType::System(SystemEvent::ReloadScripts { reason }) => {
                self.reload(reason);
            }
            EventType::System(SystemEvent::Shutdown) => {
                debug!(target: "scripting", "Shutdown received");
            }
        }
    }
}
