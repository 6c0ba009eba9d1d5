use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identifier of one arm of the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArmId(u64);

#[derive(Debug, Clone, Copy)]
struct Arm {
    id: ArmId,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct State {
    /// Armed deadlines; the last entry belongs to the innermost running script
    armed: Vec<Arm>,
    next_id: u64,
    /// Arm whose deadline passed while it was innermost
    fired: Option<ArmId>,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wall-clock watchdog for script runs.
///
/// A background thread tracks the deadline of the innermost armed run and marks
/// it fired once the deadline passes. The interpreter polls [`WatchdogProbe`]
/// at its safepoints. Arms nest: a script that triggers another dispatch arms
/// again, and the outer deadline resumes once the inner run disarms.
pub struct Watchdog {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Create a watchdog and start its timer thread
    pub fn new() -> Self {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);

        let worker = std::thread::Builder::new()
            .name("script-watchdog".to_string())
            .spawn(move || run_timer(&worker_shared));

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(target: "scripting", "Failed to start watchdog thread, script timeouts disabled: {}", e);
                None
            }
        };

        Self { shared, worker }
    }

    /// Arm the watchdog for `timeout`. Dropping the guard disarms it.
    pub fn arm(&self, timeout: Duration) -> WatchdogGuard<'_> {
        let mut state = self.shared.lock();
        let id = ArmId(state.next_id);
        state.next_id += 1;
        state.armed.push(Arm {
            id,
            deadline: Instant::now() + timeout,
        });
        drop(state);
        self.shared.wake.notify_all();

        WatchdogGuard { watchdog: self, id }
    }

    /// Handle that can be moved into the interpreter's safepoint hook
    pub fn probe(&self) -> WatchdogProbe {
        WatchdogProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of currently armed runs
    pub fn armed_count(&self) -> usize {
        self.shared.lock().armed.len()
    }

    fn disarm(&self, id: ArmId) {
        let mut state = self.shared.lock();
        state.armed.retain(|arm| arm.id != id);
        if state.fired == Some(id) {
            state.fired = None;
        }
        drop(state);
        self.shared.wake.notify_all();
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(target: "scripting", "Watchdog thread panicked");
            }
        }
    }
}

/// Disarms its watchdog arm when dropped
#[must_use = "the watchdog is disarmed as soon as the guard is dropped"]
pub struct WatchdogGuard<'a> {
    watchdog: &'a Watchdog,
    id: ArmId,
}

impl WatchdogGuard<'_> {
    pub fn id(&self) -> ArmId {
        self.id
    }
}

impl Drop for WatchdogGuard<'_> {
    fn drop(&mut self) {
        self.watchdog.disarm(self.id);
    }
}

/// Read side of the watchdog, polled from interpreter safepoints
#[derive(Clone)]
pub struct WatchdogProbe {
    shared: Arc<Shared>,
}

impl WatchdogProbe {
    /// True when the innermost armed run has exceeded its deadline
    pub fn has_fired(&self) -> bool {
        let state = self.shared.lock();
        match (state.fired, state.armed.last()) {
            (Some(fired), Some(top)) => fired == top.id,
            _ => false,
        }
    }
}

fn run_timer(shared: &Shared) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }

        let Some(top) = state.armed.last().copied() else {
            state = shared.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
            continue;
        };

        if state.fired == Some(top.id) {
            // Nothing to do until this arm is dropped or a nested one is pushed
            state = shared.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
            continue;
        }

        let now = Instant::now();
        if now >= top.deadline {
            debug!(target: "scripting", "Watchdog fired for arm {:?}", top.id);
            state.fired = Some(top.id);
            continue;
        }

        state = shared
            .wake
            .wait_timeout(state, top.deadline - now)
            .map(|(guard, _)| guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner().0);
    }
}
