use tracing::{debug, info};
use windlass_events::{EventEnvelope, EventType, SystemEvent, WindowEvent};

// Re-export EventConsumer from windlass-events
pub use windlass_events::EventConsumer;

/// Event consumer that logs every envelope on the `events` target
#[derive(Debug, Default)]
pub struct LoggingConsumer;

impl LoggingConsumer {
    pub fn new() -> Self {
        Self
    }
}

impl EventConsumer for LoggingConsumer {
    fn handle_event(&mut self, envelope: EventEnvelope) {
        match envelope.event {
            EventType::Window(event) => match event {
                WindowEvent::Opened(window) => {
                    debug!(target: "events", "Window opened: {} {:?}", window.id(), window.title());
                }
                WindowEvent::Closed(window) => {
                    debug!(target: "events", "Window closed: {}", window.id());
                }
                WindowEvent::ActiveChanged { previous, current } => {
                    debug!(
                        target: "events",
                        "Active window changed: {:?} -> {:?}",
                        previous.map(|w| w.id()),
                        current.map(|w| w.id())
                    );
                }
                WindowEvent::TitleChanged { window, title } => {
                    debug!(target: "events", "Window {} title changed: {:?}", window.id(), title);
                }
            },
            EventType::System(SystemEvent::ReloadScripts { reason }) => {
                info!(target: "events", "Script reload requested ({:?}, from {:?})", reason, envelope.source);
            }
            EventType::System(SystemEvent::Shutdown) => {
                info!(target: "events", "Shutdown requested ({:?})", envelope.source);
            }
        }
    }
}
