use std::ops::AddAssign;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error};
use windlass_events::{EventCategory, WindowRef};

use crate::classifier::Classification;
use crate::engine::ScriptEngine;

/// Outcome of one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Scripts that ran to completion
    pub ran: usize,
    /// Scripts that failed to load, raised an error or timed out
    pub failed: usize,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.ran + self.failed
    }
}

impl AddAssign for DispatchReport {
    fn add_assign(&mut self, other: Self) {
        self.ran += other.ran;
        self.failed += other.failed;
    }
}

/// Runs the scripts of one category against a target window
pub struct Dispatcher {
    snapshot: watch::Receiver<Arc<Classification>>,
}

impl Dispatcher {
    pub fn new(snapshot: watch::Receiver<Arc<Classification>>) -> Self {
        Self { snapshot }
    }

    /// The classification a dispatch started now would use
    pub fn classification(&self) -> Arc<Classification> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Run every script of `category` in order with `target` as the current window.
    ///
    /// The snapshot is read once up front, so a reload triggered from inside a
    /// script does not change the list mid-way. A failing script is logged and
    /// the next one still runs.
    pub fn dispatch(
        &self,
        engine: &ScriptEngine,
        category: EventCategory,
        target: WindowRef,
    ) -> DispatchReport {
        let classification = self.classification();
        let scripts = classification.scripts(category);
        let mut report = DispatchReport::default();

        if scripts.is_empty() {
            return report;
        }

        debug!(
            target: "scripting",
            "Dispatching {} to {} script(s) for window {}",
            category,
            scripts.len(),
            target.id()
        );

        let _guard = engine.context().enter(target);

        for path in scripts {
            let result = engine.load(path).and_then(|script| engine.run(&script));
            match result {
                Ok(()) => report.ran += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(target: "scripting", "{}", e);
                }
            }
        }

        report
    }
}
