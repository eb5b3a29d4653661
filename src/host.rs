//! HostBackend trait + headless implementation.
//!
//! The navigation core depends on this trait, not on a browser: it polls the
//! viewport at decision points and drains queued host input. This enables
//! mock backends for testing and any host that can mirror its DOM.

use crate::types::HostInputEvent;

// ============================================================================
// HostBackend Trait
// ============================================================================

pub trait HostBackend {
    /// Current viewport size in CSS pixels (`clientWidth`, `clientHeight`).
    fn viewport(&self) -> (f32, f32);
    fn set_viewport(&mut self, width: f32, height: f32);
    /// Queue host input for a later `read_events`.
    fn push_event(&mut self, event: HostInputEvent);
    fn read_events(&mut self) -> Vec<HostInputEvent>;

    /// Downcast support for test code. Returns self as Any for type-safe downcasting.
    #[cfg(test)]
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

// ============================================================================
// HeadlessBackend
// ============================================================================

/// Backend used behind the FFI: the host pushes viewport changes and input.
pub struct HeadlessBackend {
    width: f32,
    height: f32,
    queued: Vec<HostInputEvent>,
}

impl HeadlessBackend {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            queued: Vec::new(),
        }
    }
}

impl HostBackend for HeadlessBackend {
    fn viewport(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn set_viewport(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn push_event(&mut self, event: HostInputEvent) {
        self.queued.push(event);
    }

    fn read_events(&mut self) -> Vec<HostInputEvent> {
        std::mem::take(&mut self.queued)
    }

    #[cfg(test)]
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

// ============================================================================
// MockBackend (for Rust unit tests only)
// ============================================================================

#[cfg(test)]
pub struct MockBackend {
    pub width: f32,
    pub height: f32,
    pub injected_events: Vec<HostInputEvent>,
    pub viewport_polls: std::cell::Cell<u32>,
}

#[cfg(test)]
impl MockBackend {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            injected_events: Vec::new(),
            viewport_polls: std::cell::Cell::new(0),
        }
    }
}

#[cfg(test)]
impl HostBackend for MockBackend {
    fn viewport(&self) -> (f32, f32) {
        self.viewport_polls.set(self.viewport_polls.get() + 1);
        (self.width, self.height)
    }

    fn set_viewport(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn push_event(&mut self, event: HostInputEvent) {
        self.injected_events.push(event);
    }

    fn read_events(&mut self) -> Vec<HostInputEvent> {
        std::mem::take(&mut self.injected_events)
    }

    #[cfg(test)]
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NavKey;

    #[test]
    fn test_headless_queue_drains_once() {
        let mut backend = HeadlessBackend::new(1280.0, 800.0);
        backend.push_event(HostInputEvent::Key {
            target: 3,
            key: NavKey::Tab,
            shift: false,
        });
        assert_eq!(backend.read_events().len(), 1);
        assert!(backend.read_events().is_empty());
    }

    #[test]
    fn test_headless_viewport_updates() {
        let mut backend = HeadlessBackend::new(1280.0, 800.0);
        backend.set_viewport(640.0, 480.0);
        assert_eq!(backend.viewport(), (640.0, 480.0));
    }
}
