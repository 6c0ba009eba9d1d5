use std::ops::ControlFlow;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info};
use windlass_events::{EventConsumer, EventEnvelope, EventType, SystemEvent};

/// Capacity of the envelope channel shared by all event sources
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Feeds envelopes to the consumers one at a time, on the current task.
///
/// Consumers never run concurrently, so a reload can never overlap a dispatch.
pub struct EventLoop {
    rx: mpsc::Receiver<EventEnvelope>,
    consumers: Vec<Box<dyn EventConsumer>>,
    handled: usize,
}

impl EventLoop {
    pub fn new(rx: mpsc::Receiver<EventEnvelope>) -> Self {
        Self {
            rx,
            consumers: Vec::new(),
            handled: 0,
        }
    }

    pub fn add_consumer(&mut self, consumer: Box<dyn EventConsumer>) {
        self.consumers.push(consumer);
    }

    /// Run until a shutdown envelope, Ctrl+C, or every sender is gone.
    /// Returns the number of envelopes delivered.
    pub async fn run(mut self) -> usize {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                envelope = self.rx.recv() => {
                    let Some(envelope) = envelope else {
                        info!(target: "runner", "All event sources closed");
                        break;
                    };
                    if self.handle(envelope).is_break() {
                        break;
                    }
                }
                _ = &mut ctrl_c => {
                    info!(target: "runner", "Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.handled
    }

    fn handle(&mut self, envelope: EventEnvelope) -> ControlFlow<()> {
        if !envelope.is_reload() {
            let shutdown = matches!(envelope.event, EventType::System(SystemEvent::Shutdown));
            self.deliver(envelope);
            return if shutdown {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            };
        }

        // Coalesce a burst of reload requests into one reload
        let mut coalesced = 0;
        let mut next = None;
        loop {
            match self.rx.try_recv() {
                Ok(queued) if queued.is_reload() => coalesced += 1,
                Ok(queued) => {
                    next = Some(queued);
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if coalesced > 0 {
            debug!(target: "runner", "Coalesced {} queued reload request(s)", coalesced);
        }

        self.deliver(envelope);
        match next {
            Some(queued) => self.handle(queued),
            None => ControlFlow::Continue(()),
        }
    }

    fn deliver(&mut self, envelope: EventEnvelope) {
        self.handled += 1;
        if let Some((last, rest)) = self.consumers.split_last_mut() {
            for consumer in rest {
                consumer.handle_event(envelope.clone());
            }
            last.handle_event(envelope);
        }
    }
}
