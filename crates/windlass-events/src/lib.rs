/// Event types and consumer traits for windlass
///
/// This crate holds the vocabulary shared by the event sources, the scripting
/// host and the runner, so none of them depend on each other for it.
use std::time::Instant;

mod system_events;
mod window_events;

pub use system_events::{ReloadReason, SystemEvent};
pub use window_events::{EventCategory, Window, WindowEvent, WindowId, WindowRef};

// ============================================================================
// Event Source
// ============================================================================

/// Source of the event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// Event originated from the windowing system
    WindowSystem,
    /// Event originated from a filesystem watch
    FileSystem,
    /// Event originated from a process signal
    Signal,
    /// Event was read from replay input
    Replay,
}

// ============================================================================
// Event Envelope
// ============================================================================

/// Unified event type
#[derive(Debug, Clone)]
pub enum EventType {
    Window(WindowEvent),
    System(SystemEvent),
}

/// Complete event envelope
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event: EventType,
    pub timestamp: Instant,
    pub source: EventSource,
}

impl EventEnvelope {
    pub fn new(event: EventType, source: EventSource) -> Self {
        Self {
            event,
            timestamp: Instant::now(),
            source,
        }
    }

    pub fn window_event(event: WindowEvent, source: EventSource) -> Self {
        Self::new(EventType::Window(event), source)
    }

    pub fn system_event(event: SystemEvent, source: EventSource) -> Self {
        Self::new(EventType::System(event), source)
    }

    pub fn reload(reason: ReloadReason, source: EventSource) -> Self {
        Self::system_event(SystemEvent::ReloadScripts { reason }, source)
    }

    pub fn is_reload(&self) -> bool {
        matches!(
            self.event,
            EventType::System(SystemEvent::ReloadScripts { .. })
        )
    }
}

// ============================================================================
// Event Consumer Trait
// ============================================================================

/// Trait for consuming events.
///
/// Consumers run on the event-loop thread and are not required to be `Send`:
/// the scripting host owns a single interpreter that never leaves that thread.
pub trait EventConsumer {
    /// Handle an event envelope
    fn handle_event(&mut self, envelope: EventEnvelope);
}
