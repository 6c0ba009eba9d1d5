use std::cell::RefCell;
use std::rc::Rc;

use windlass_events::WindowRef;

/// The window the in-progress dispatch is operating on.
///
/// Shared between the dispatcher and the capability bindings installed in the
/// interpreter. Handlers never hold a borrow across a call, so a script whose
/// side effect raises another event can re-enter the dispatcher safely.
#[derive(Clone, Default)]
pub struct CurrentWindow {
    slot: Rc<RefCell<Option<WindowRef>>>,
}

impl CurrentWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current window, if a dispatch is in progress
    pub fn get(&self) -> Option<WindowRef> {
        self.slot.borrow().clone()
    }

    /// Forget the current window
    pub fn clear(&self) {
        self.slot.borrow_mut().take();
    }

    /// Make `window` current until the returned guard is dropped, at which point
    /// the previous value is put back
    pub fn enter(&self, window: WindowRef) -> ContextGuard {
        let previous = self.slot.borrow_mut().replace(window);
        ContextGuard {
            slot: self.clone(),
            previous: Some(previous),
        }
    }
}

/// Restores the previous current window on drop
#[must_use = "the previous window is restored as soon as the guard is dropped"]
pub struct ContextGuard {
    slot: CurrentWindow,
    previous: Option<Option<WindowRef>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.slot.slot.borrow_mut() = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use windlass_events::{Window, WindowId};

    #[derive(Debug)]
    struct TestWindow(u64);

    impl Window for TestWindow {
        fn id(&self) -> WindowId {
            WindowId(self.0)
        }

        fn title(&self) -> String {
            format!("window {}", self.0)
        }
    }

    fn current_id(ctx: &CurrentWindow) -> Option<u64> {
        ctx.get().map(|w| w.id().0)
    }

    #[test]
    fn test_starts_empty() {
        assert!(CurrentWindow::new().get().is_none());
    }

    #[test]
    fn test_guard_restores_previous() {
        let ctx = CurrentWindow::new();
        {
            let _outer = ctx.enter(Arc::new(TestWindow(1)));
            assert_eq!(current_id(&ctx), Some(1));
            {
                let _inner = ctx.enter(Arc::new(TestWindow(2)));
                assert_eq!(current_id(&ctx), Some(2));
            }
            assert_eq!(current_id(&ctx), Some(1));
        }
        assert_eq!(current_id(&ctx), None);
    }

    #[test]
    fn test_clear() {
        let ctx = CurrentWindow::new();
        let _guard = ctx.enter(Arc::new(TestWindow(7)));
        ctx.clear();
        assert!(ctx.get().is_none());
    }
}
