use std::fmt;
use std::sync::Arc;

/// Identity of a managed window (the X11 window id for the real host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A managed on-screen window that scripts operate on.
///
/// Implemented by the host's windowing-system binding. Only the accessors the
/// dispatch engine itself needs live here; everything else is reached through
/// the capability table.
pub trait Window: Send + Sync + fmt::Debug {
    /// Stable identity of the window
    fn id(&self) -> WindowId;

    /// Current title of the window (may be empty)
    fn title(&self) -> String;

    /// Name of the application owning the window, if known
    fn application_name(&self) -> Option<String> {
        None
    }

    /// Window class, if known
    fn class_name(&self) -> Option<String> {
        None
    }
}

/// Shared handle to a window
pub type WindowRef = Arc<dyn Window>;

/// Categories scripts can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventCategory {
    /// A window was created
    Creation,
    /// A window was destroyed
    Destruction,
    /// A window became the active window
    FocusGained,
    /// A window stopped being the active window
    FocusLost,
    /// The title of a watched window changed
    TitleChanged,
}

impl EventCategory {
    /// All categories, in the order used when printing diagnostics
    pub const ALL: [EventCategory; 5] = [
        EventCategory::Creation,
        EventCategory::Destruction,
        EventCategory::FocusGained,
        EventCategory::FocusLost,
        EventCategory::TitleChanged,
    ];

    /// Operator-facing name of the category
    pub fn name(&self) -> &'static str {
        match self {
            EventCategory::Creation => "window_open",
            EventCategory::Destruction => "window_close",
            EventCategory::FocusGained => "window_focus",
            EventCategory::FocusLost => "window_blur",
            EventCategory::TitleChanged => "window_name_change",
        }
    }

    /// Position of the category in [`EventCategory::ALL`]
    pub fn index(&self) -> usize {
        match self {
            EventCategory::Creation => 0,
            EventCategory::Destruction => 1,
            EventCategory::FocusGained => 2,
            EventCategory::FocusLost => 3,
            EventCategory::TitleChanged => 4,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw notifications coming from the windowing system
#[derive(Debug, Clone)]
pub enum WindowEvent {
    /// A window was opened
    Opened(WindowRef),
    /// A window was closed
    Closed(WindowRef),
    /// The active window changed
    ActiveChanged {
        previous: Option<WindowRef>,
        current: Option<WindowRef>,
    },
    /// A window's title changed. `title` is the title carried by the notification.
    TitleChanged { window: WindowRef, title: String },
}

impl WindowEvent {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            WindowEvent::Opened(_) => "opened",
            WindowEvent::Closed(_) => "closed",
            WindowEvent::ActiveChanged { .. } => "active-changed",
            WindowEvent::TitleChanged { .. } => "title-changed",
        }
    }
}
