use windlass_events::WindowId;

/// Drops a title-change notification that repeats the previous one.
///
/// Only the single most recent (window, title) pair is remembered, process wide.
/// Alternating notifications between two windows therefore all pass.
#[derive(Debug, Default)]
pub struct TitleChangeFilter {
    last: Option<(WindowId, String)>,
}

impl TitleChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// False when `(window, title)` equals the last recorded pair byte for byte.
    /// Otherwise records the pair and returns true.
    pub fn should_dispatch_title_change(&mut self, window: WindowId, title: &str) -> bool {
        if let Some((last_window, last_title)) = &self.last {
            if *last_window == window && last_title == title {
                return false;
            }
        }
        self.last = Some((window, title.to_string()));
        true
    }

    pub fn last(&self) -> Option<(WindowId, &str)> {
        self.last.as_ref().map(|(id, title)| (*id, title.as_str()))
    }
}
