//! Document and NavContext structs, global state accessor.
//!
//! `Document` is the mirrored node tree plus everything observable about it:
//! focus, attributes, and the side-effect buffer the host drains.
//! `NavContext` pairs it with the menu controller that navigates it.
//! A single global instance is managed via `gnav_init_headless()` / `gnav_shutdown()`.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
#[cfg(not(test))]
use std::thread::ThreadId;

use tracing::trace;

use crate::config::NavConfig;
use crate::error::{NavError, Result};
use crate::host::HostBackend;
use crate::menu::Menu;
use crate::types::{AnalyticsState, NavEvent, NavNode, NodeClasses, NodeKind};

pub struct Document {
    // Tree Module
    pub tree: taffy::TaffyTree<()>,
    pub nodes: HashMap<u32, NavNode>,
    pub next_handle: u32,
    pub root: Option<u32>,

    // Focus & side effects
    pub focused: Option<u32>,
    pub event_buffer: Vec<NavEvent>,
    pub backend: Box<dyn HostBackend>,

    // Layout Module
    pub laid_out_viewport: Option<(f32, f32)>,

    pub config: NavConfig,
}

impl Document {
    pub fn new(backend: Box<dyn HostBackend>) -> Self {
        Self {
            tree: taffy::TaffyTree::new(),
            nodes: HashMap::new(),
            next_handle: 1, // Handle(0) is permanently invalid
            root: None,

            focused: None,
            event_buffer: Vec::new(),
            backend,

            laid_out_viewport: None,

            config: NavConfig::default(),
        }
    }

    /// Validate that a handle refers to an existing node.
    pub fn validate_handle(&self, handle: u32) -> Result<()> {
        if handle == 0 {
            return Err(NavError::InvalidSentinel);
        }
        if !self.nodes.contains_key(&handle) {
            return Err(NavError::InvalidHandle(handle));
        }
        Ok(())
    }

    pub fn node(&self, handle: u32) -> Option<&NavNode> {
        self.nodes.get(&handle)
    }

    pub fn kind(&self, handle: u32) -> Option<NodeKind> {
        self.nodes.get(&handle).map(|n| n.kind)
    }

    pub fn is_expanded(&self, handle: u32) -> bool {
        self.nodes.get(&handle).is_some_and(NavNode::is_expanded)
    }

    pub fn has_class(&self, handle: u32, class: NodeClasses) -> bool {
        self.nodes
            .get(&handle)
            .is_some_and(|n| n.classes.contains(class))
    }

    pub fn viewport_width(&self) -> f32 {
        self.backend.viewport().0
    }

    /// Media-query equivalent, polled at decision points.
    pub fn is_desktop(&self) -> bool {
        self.viewport_width() >= self.config.desktop_breakpoint()
    }

    pub fn is_rtl(&self) -> bool {
        self.config.is_rtl()
    }

    // ------------------------------------------------------------------------
    // Mutations. Each one is mirrored to the host through the event buffer.
    // ------------------------------------------------------------------------

    /// Move focus. Unknown handles are ignored.
    pub fn focus(&mut self, handle: u32) {
        if !self.nodes.contains_key(&handle) || self.focused == Some(handle) {
            return;
        }
        let old = self.focused.unwrap_or(0);
        self.focused = Some(handle);
        trace!(from = old, to = handle, "focus");
        self.event_buffer.push(NavEvent::focus_change(old, handle));
    }

    pub fn activate(&mut self, handle: u32) {
        if self.nodes.contains_key(&handle) {
            self.event_buffer.push(NavEvent::activate(handle));
        }
    }

    pub fn scroll_into_view(&mut self, handle: u32) {
        if self.nodes.contains_key(&handle) {
            self.event_buffer.push(NavEvent::scroll_into_view(handle));
        }
    }

    pub fn set_expanded(&mut self, handle: u32, expanded: bool) {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return;
        };
        if node.aria_expanded == Some(expanded) {
            return;
        }
        node.aria_expanded = Some(expanded);
        self.event_buffer.push(NavEvent::expanded(handle, expanded));
        crate::tree::mark_dirty(self, handle);
    }

    /// Update the analytics label, only when the attribute is present.
    pub fn set_analytics(&mut self, handle: u32, state: AnalyticsState) {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return;
        };
        match node.analytics {
            Some(current) if current != state => {
                node.analytics = Some(state);
                self.event_buffer.push(NavEvent::analytics(handle, state));
            }
            _ => {}
        }
    }

    pub fn add_class(&mut self, handle: u32, class: NodeClasses) {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return;
        };
        if node.classes.contains(class) {
            return;
        }
        node.classes.insert(class);
        self.event_buffer
            .push(NavEvent::class_change(handle, class, true));
        crate::tree::mark_dirty(self, handle);
    }

    pub fn remove_class(&mut self, handle: u32, class: NodeClasses) {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return;
        };
        if !node.classes.intersects(class) {
            return;
        }
        node.classes.remove(class);
        self.event_buffer
            .push(NavEvent::class_change(handle, class, false));
        crate::tree::mark_dirty(self, handle);
    }

    pub fn set_offset_left(&mut self, handle: u32, left: Option<f32>) {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return;
        };
        if node.offset_left == left {
            return;
        }
        node.offset_left = left;
        self.event_buffer.push(NavEvent::offset(handle, left));
        crate::tree::mark_dirty(self, handle);
    }

    /// Handles of every node carrying `class`, in no particular order.
    pub fn nodes_with_class(&self, class: NodeClasses) -> Vec<u32> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.classes.contains(class))
            .map(|(&h, _)| h)
            .collect()
    }
}

pub struct NavContext {
    pub doc: Document,
    pub menu: Menu,
    /// Names given to nodes in loaded markup.
    pub markup_ids: HashMap<String, u32>,

    // Diagnostics
    pub last_error: String,
}

// SAFETY: navigation runs on the host's main thread only. The lock is used
// for aliasing safety at the FFI boundary, not to introduce concurrent
// access; thread affinity is checked on every access below.
unsafe impl Send for NavContext {}
unsafe impl Sync for NavContext {}

impl NavContext {
    pub fn new(backend: Box<dyn HostBackend>) -> Self {
        Self {
            doc: Document::new(backend),
            menu: Menu::default(),
            markup_ids: HashMap::new(),
            last_error: String::new(),
        }
    }
}

// ============================================================================
// Global State
// ============================================================================

static CONTEXT: OnceLock<RwLock<Option<NavContext>>> = OnceLock::new();
#[cfg(not(test))]
static OWNER_THREAD: OnceLock<RwLock<Option<ThreadId>>> = OnceLock::new();

fn context_lock() -> &'static RwLock<Option<NavContext>> {
    CONTEXT.get_or_init(|| RwLock::new(None))
}

#[cfg(not(test))]
fn owner_thread_lock() -> &'static RwLock<Option<ThreadId>> {
    OWNER_THREAD.get_or_init(|| RwLock::new(None))
}

fn ensure_thread_affinity() -> Result<()> {
    #[cfg(test)]
    {
        return Ok(());
    }

    #[cfg(not(test))]
    {
        let current = std::thread::current().id();
        let owner = owner_thread_lock()
            .read()
            .map_err(|_| NavError::LockPoisoned("owner_thread"))?;
        if let Some(owner_id) = *owner {
            if owner_id != current {
                return Err(NavError::WrongThread);
            }
        }
        Ok(())
    }
}

#[cfg(not(test))]
fn bind_owner_thread_current() -> Result<()> {
    let current = std::thread::current().id();
    let mut owner = owner_thread_lock()
        .write()
        .map_err(|_| NavError::LockPoisoned("owner_thread"))?;
    if let Some(owner_id) = *owner {
        if owner_id != current {
            return Err(NavError::WrongThread);
        }
    }
    *owner = Some(current);
    Ok(())
}

#[cfg(test)]
fn bind_owner_thread_current() -> Result<()> {
    Ok(())
}

#[cfg(not(test))]
fn clear_owner_thread() -> Result<()> {
    let mut owner = owner_thread_lock()
        .write()
        .map_err(|_| NavError::LockPoisoned("owner_thread"))?;
    *owner = None;
    Ok(())
}

#[cfg(test)]
fn clear_owner_thread() -> Result<()> {
    Ok(())
}

pub struct ContextReadGuard<'a> {
    guard: RwLockReadGuard<'a, Option<NavContext>>,
}

impl Deref for ContextReadGuard<'_> {
    type Target = NavContext;

    fn deref(&self) -> &Self::Target {
        self.guard
            .as_ref()
            .expect("ContextReadGuard is only constructed for initialized context")
    }
}

pub struct ContextWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, Option<NavContext>>,
}

impl Deref for ContextWriteGuard<'_> {
    type Target = NavContext;

    fn deref(&self) -> &Self::Target {
        self.guard
            .as_ref()
            .expect("ContextWriteGuard is only constructed for initialized context")
    }
}

impl DerefMut for ContextWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard
            .as_mut()
            .expect("ContextWriteGuard is only constructed for initialized context")
    }
}

/// Acquire a read lock for the global context.
pub fn context_read() -> Result<ContextReadGuard<'static>> {
    ensure_thread_affinity()?;
    let guard = context_lock()
        .read()
        .map_err(|_| NavError::LockPoisoned("context"))?;
    if guard.is_none() {
        return Err(NavError::NotInitialized);
    }
    Ok(ContextReadGuard { guard })
}

/// Acquire a write lock for the global context.
pub fn context_write() -> Result<ContextWriteGuard<'static>> {
    ensure_thread_affinity()?;
    let guard = context_lock()
        .write()
        .map_err(|_| NavError::LockPoisoned("context"))?;
    if guard.is_none() {
        return Err(NavError::NotInitialized);
    }
    Ok(ContextWriteGuard { guard })
}

/// Initialize the global context with the given backend.
pub fn init_context(backend: Box<dyn HostBackend>) -> Result<()> {
    ensure_thread_affinity()?;
    bind_owner_thread_current()?;

    let mut guard = context_lock()
        .write()
        .map_err(|_| NavError::LockPoisoned("context"))?;
    if guard.is_some() {
        return Err(NavError::AlreadyInitialized);
    }
    *guard = Some(NavContext::new(backend));
    Ok(())
}

/// Destroy the global context.
pub fn destroy_context() -> Result<()> {
    ensure_thread_affinity()?;
    let mut guard = context_lock()
        .write()
        .map_err(|_| NavError::LockPoisoned("context"))?;
    guard.take();
    drop(guard);
    clear_owner_thread()
}

/// Store an error message in the global context (best-effort; ignores if no context).
pub fn set_last_error(msg: String) {
    if ensure_thread_affinity().is_err() {
        return;
    }
    if let Ok(mut guard) = context_lock().write() {
        if let Some(ctx) = guard.as_mut() {
            ctx.last_error = msg;
        }
    }
}

/// Snapshot the last error into owned memory.
pub fn get_last_error_snapshot() -> Option<String> {
    if ensure_thread_affinity().is_err() {
        return None;
    }
    if let Ok(guard) = context_lock().read() {
        if let Some(ctx) = guard.as_ref() {
            if !ctx.last_error.is_empty() {
                return Some(ctx.last_error.clone());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockBackend;
    use crate::tree;
    use crate::types::NavEventType;

    fn test_doc() -> Document {
        Document::new(Box::new(MockBackend::new(1280.0, 800.0)))
    }

    #[test]
    fn test_focus_emits_single_event() {
        let mut doc = test_doc();
        let a = tree::create_node(&mut doc, NodeKind::NavLink).unwrap();

        doc.focus(a);
        doc.focus(a);
        assert_eq!(doc.focused, Some(a));
        assert_eq!(doc.event_buffer.len(), 1);
        assert_eq!(
            doc.event_buffer[0].event_type,
            NavEventType::FocusChange as u32
        );

        doc.focus(999);
        assert_eq!(doc.focused, Some(a));
    }

    #[test]
    fn test_analytics_only_when_attribute_present() {
        let mut doc = test_doc();
        let a = tree::create_node(&mut doc, NodeKind::NavLink).unwrap();

        doc.set_analytics(a, AnalyticsState::Close);
        assert_eq!(doc.nodes[&a].analytics, None);

        doc.nodes.get_mut(&a).unwrap().analytics = Some(AnalyticsState::Open);
        doc.set_analytics(a, AnalyticsState::Close);
        assert_eq!(doc.nodes[&a].analytics, Some(AnalyticsState::Close));
    }

    #[test]
    fn test_desktop_follows_breakpoint() {
        let mut doc = test_doc();
        assert!(doc.is_desktop());

        doc.config.small_desktop = true;
        doc.backend.set_viewport(950.0, 800.0);
        assert!(doc.is_desktop());

        doc.config.small_desktop = false;
        assert!(!doc.is_desktop());
    }

    #[test]
    fn test_class_toggle_is_idempotent() {
        let mut doc = test_doc();
        let p = tree::create_node(&mut doc, NodeKind::Popup).unwrap();

        doc.add_class(p, NodeClasses::OPEN_POPUP);
        doc.add_class(p, NodeClasses::OPEN_POPUP);
        doc.remove_class(p, NodeClasses::OPEN_POPUP);
        doc.remove_class(p, NodeClasses::OPEN_POPUP);
        assert_eq!(doc.event_buffer.len(), 2);
        assert_eq!(doc.nodes_with_class(NodeClasses::OPEN_POPUP), Vec::<u32>::new());
    }

    #[test]
    fn test_handle_zero_invalid() {
        let doc = test_doc();
        assert!(matches!(
            doc.validate_handle(0),
            Err(NavError::InvalidSentinel)
        ));
        assert!(matches!(
            doc.validate_handle(42),
            Err(NavError::InvalidHandle(42))
        ));
    }
}
