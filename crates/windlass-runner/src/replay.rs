//! Line-based event source.
//!
//! Drives the scripting host without a windowing-system connection. Each line
//! of input is one command:
//!
//! ```text
//! open <id> <title>     a window appeared
//! close <id>            a window went away
//! focus <id>            <id> became the active window
//! focus -               no window is active
//! title <id> <title>    a window's title changed
//! reload                rebuild the script lists
//! ```
//!
//! Ids are decimal or `0x`-prefixed hex. Blank lines and lines starting with
//! `#` are skipped. When the input ends the host keeps running on its other
//! sources unless asked to shut down at end of input.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use windlass_events::{
    EventEnvelope, EventSource, ReloadReason, SystemEvent, Window, WindowEvent, WindowId, WindowRef,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayCommand {
    Open { id: WindowId, title: String },
    Close { id: WindowId },
    Focus { id: Option<WindowId> },
    Title { id: WindowId, title: String },
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}: missing window id")]
    MissingId(&'static str),
    #[error("invalid window id: {0}")]
    InvalidId(String),
}

/// Parse one input line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<ReplayCommand>, ReplayParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (command, rest) = split_word(line);
    let command = match command {
        "open" => {
            let (id, title) = split_word(rest);
            ReplayCommand::Open {
                id: parse_id("open", id)?,
                title: title.to_string(),
            }
        }
        "close" => ReplayCommand::Close {
            id: parse_id("close", rest)?,
        },
        "focus" if rest == "-" => ReplayCommand::Focus { id: None },
        "focus" => ReplayCommand::Focus {
            id: Some(parse_id("focus", rest)?),
        },
        "title" => {
            let (id, title) = split_word(rest);
            ReplayCommand::Title {
                id: parse_id("title", id)?,
                title: title.to_string(),
            }
        }
        "reload" => ReplayCommand::Reload,
        other => return Err(ReplayParseError::UnknownCommand(other.to_string())),
    };

    Ok(Some(command))
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn parse_id(command: &'static str, s: &str) -> Result<WindowId, ReplayParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ReplayParseError::MissingId(command));
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed
        .map(WindowId)
        .map_err(|_| ReplayParseError::InvalidId(s.to_string()))
}

// ============================================================================
// Replay windows
// ============================================================================

/// In-memory window whose title can be edited by replay input
#[derive(Debug)]
pub struct ReplayWindow {
    id: WindowId,
    title: RwLock<String>,
}

impl ReplayWindow {
    pub fn new(id: WindowId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: RwLock::new(title.into()),
        }
    }

    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.write().unwrap_or_else(PoisonError::into_inner) = title.into();
    }
}

impl Window for ReplayWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn title(&self) -> String {
        self.title
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn application_name(&self) -> Option<String> {
        Some("replay".to_string())
    }
}

/// Windows known to the replay source and the active one
#[derive(Debug, Default)]
pub struct ReplayState {
    windows: HashMap<WindowId, Arc<ReplayWindow>>,
    active: Option<WindowRef>,
}

impl ReplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&self, id: WindowId) -> Option<Arc<ReplayWindow>> {
        self.windows.get(&id).cloned()
    }

    pub fn active(&self) -> Option<WindowId> {
        self.active.as_ref().map(|w| w.id())
    }

    /// Update the state and produce the envelope the command stands for
    pub fn apply(&mut self, command: ReplayCommand) -> Option<EventEnvelope> {
        let event = match command {
            ReplayCommand::Reload => {
                return Some(EventEnvelope::reload(ReloadReason::Manual, EventSource::Replay));
            }
            ReplayCommand::Open { id, title } => {
                let window = Arc::new(ReplayWindow::new(id, title));
                self.windows.insert(id, Arc::clone(&window));
                WindowEvent::Opened(window)
            }
            ReplayCommand::Close { id } => {
                let window = self.known(id)?;
                self.windows.remove(&id);
                if self.active() == Some(id) {
                    self.active = None;
                }
                WindowEvent::Closed(window)
            }
            ReplayCommand::Focus { id: Some(id) } => {
                let current: WindowRef = self.known(id)?;
                let previous = self.active.replace(Arc::clone(&current));
                WindowEvent::ActiveChanged {
                    previous,
                    current: Some(current),
                }
            }
            ReplayCommand::Focus { id: None } => WindowEvent::ActiveChanged {
                previous: self.active.take(),
                current: None,
            },
            ReplayCommand::Title { id, title } => {
                let window = self.known(id)?;
                window.set_title(title.clone());
                WindowEvent::TitleChanged {
                    window: window as WindowRef,
                    title,
                }
            }
        };

        Some(EventEnvelope::window_event(event, EventSource::Replay))
    }

    fn known(&self, id: WindowId) -> Option<Arc<ReplayWindow>> {
        let window = self.window(id);
        if window.is_none() {
            warn!(target: "events", "Replay refers to unknown window {}", id);
        }
        window
    }
}

/// Read commands from `reader` until it ends. With `exit_at_eof` a shutdown
/// is requested at the end; otherwise the sender is just dropped.
pub async fn run_replay<R>(reader: R, tx: mpsc::Sender<EventEnvelope>, exit_at_eof: bool) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut state = ReplayState::new();
    let mut sent = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(target: "events", "Failed to read replay input: {}", e);
                break;
            }
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!(target: "events", "Skipping replay line {:?}: {}", line, e);
                continue;
            }
        };

        debug!(target: "events", "Replay: {:?}", command);
        let Some(envelope) = state.apply(command) else {
            continue;
        };
        if tx.send(envelope).await.is_err() {
            return sent;
        }
        sent += 1;
    }

    info!(target: "events", "Replay input finished after {} event(s)", sent);
    if exit_at_eof {
        let _ = tx
            .send(EventEnvelope::system_event(SystemEvent::Shutdown, EventSource::Replay))
            .await;
    }
    sent
}

/// Spawn a task replaying standard input
pub fn spawn_stdin_replay(tx: mpsc::Sender<EventEnvelope>, exit_at_eof: bool) {
    tokio::spawn(async move {
        run_replay(BufReader::new(tokio::io::stdin()), tx, exit_at_eof).await;
    });
}
