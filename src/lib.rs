//! Global Navigation Focus Core — Native FFI Entry Points
//!
//! This file contains ONLY `extern "C"` FFI functions. Each function:
//! 1. Wraps its body in `catch_unwind`
//! 2. Validates inputs at the boundary
//! 3. Delegates to the appropriate module function
//! 4. Returns a status code
//!
//! No navigation logic lives here.

// All public functions in this file are `extern "C"` FFI entry points called
// across the C ABI boundary. The caller is already in unsafe territory by
// definition; raw-pointer arguments are part of the FFI contract. Marking
// every entry point `unsafe fn` would change the ABI signature. Pointer
// validity is checked (null guards) inside each function body before
// dereferencing.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

mod config;
mod context;
mod error;
mod event;
mod host;
mod layout;
mod logging;
mod markup;
mod menu;
mod model;
mod popup;
pub mod roving;
mod style;
mod tree;
pub mod types;
mod visibility;

use std::panic::{catch_unwind, AssertUnwindSafe};

use config::NavConfig;
use context::{context_read, context_write, destroy_context, init_context, set_last_error};
use error::{NavError, Result};
use host::HeadlessBackend;
use types::{AnalyticsState, Breakpoint, HostInputEvent, NavEvent, NavKey, NodeClasses, NodeKind};

// ============================================================================
// Safety wrapper: every FFI entry point uses this pattern
// ============================================================================

/// Wrap an FFI function body. Returns the body's code on success,
/// -1 on error, -2 on panic.
fn ffi_wrap(f: impl FnOnce() -> Result<i32>) -> i32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(code)) => code,
        Ok(Err(e)) => {
            set_last_error(e.to_string());
            -1
        }
        Err(_) => {
            set_last_error("internal panic".to_string());
            -2
        }
    }
}

/// Wrap an FFI function that returns a u32 handle. Returns 0 on error.
fn ffi_wrap_handle(f: impl FnOnce() -> Result<u32>) -> u32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            set_last_error(e.to_string());
            0
        }
        Err(_) => {
            set_last_error("internal panic".to_string());
            0
        }
    }
}

/// Borrow a UTF-8 string argument. Null or empty input reads as "".
fn str_arg<'a>(ptr: *const u8, len: u32) -> Result<&'a str> {
    if ptr.is_null() || len == 0 {
        return Ok("");
    }
    let slice = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
    Ok(std::str::from_utf8(slice)?)
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create the context. The viewport is the host's `clientWidth`/`clientHeight`.
#[no_mangle]
pub extern "C" fn gnav_init_headless(width: f32, height: f32) -> i32 {
    ffi_wrap(|| {
        init_context(Box::new(HeadlessBackend::new(width, height)))?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_shutdown() -> i32 {
    ffi_wrap(|| {
        destroy_context()?;
        Ok(0)
    })
}

/// Apply a JSON `NavConfig`. The menu rediscovers its items against it.
#[no_mangle]
pub extern "C" fn gnav_configure(ptr: *const u8, len: u32) -> i32 {
    ffi_wrap(|| {
        let json = str_arg(ptr, len)?;
        let cfg = NavConfig::from_json(if json.is_empty() { "{}" } else { json })?;
        if cfg.debug {
            logging::init_default();
        }
        let mut ctx = context_write()?;
        let ctx = &mut *ctx;
        ctx.doc.config = cfg;
        if ctx.menu.is_initialized() {
            ctx.menu.reset(&mut ctx.doc);
        }
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_set_debug(enabled: u8) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.config.debug = enabled != 0;
        if enabled != 0 {
            logging::init_default();
        }
        Ok(0)
    })
}

// ============================================================================
// Node Lifecycle
// ============================================================================

#[no_mangle]
pub extern "C" fn gnav_create_node(kind: u8) -> u32 {
    ffi_wrap_handle(|| {
        let kind = NodeKind::from_u8(kind).ok_or(NavError::InvalidKind(kind))?;
        let mut ctx = context_write()?;
        tree::create_node(&mut ctx.doc, kind)
    })
}

#[no_mangle]
pub extern "C" fn gnav_destroy_node(handle: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        tree::destroy_node(&mut ctx.doc, handle)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_get_kind(handle: u32) -> i32 {
    ffi_wrap(|| {
        let ctx = context_read()?;
        ctx.doc.validate_handle(handle)?;
        Ok(ctx.doc.kind(handle).map_or(-1, |k| k as i32))
    })
}

#[no_mangle]
pub extern "C" fn gnav_get_node_count() -> u32 {
    catch_unwind(AssertUnwindSafe(|| -> u32 {
        context_read().map_or(0, |ctx| ctx.doc.nodes.len() as u32)
    }))
    .unwrap_or_default()
}

// ============================================================================
// Tree Structure
// ============================================================================

#[no_mangle]
pub extern "C" fn gnav_set_root(handle: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        ctx.doc.root = Some(handle);
        tree::mark_dirty(&mut ctx.doc, handle);
        // Items are rediscovered on the next input.
        ctx.menu.destroy();
        Ok(0)
    })
}

/// Append a child. Appending into the tree is a mutation notification:
/// a popup waiting for its subtree picks it up here.
#[no_mangle]
pub extern "C" fn gnav_append_child(parent: u32, child: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        let ctx = &mut *ctx;
        tree::append_child(&mut ctx.doc, parent, child)?;
        ctx.menu.on_tree_mutation(&mut ctx.doc, parent);
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_remove_child(parent: u32, child: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        tree::remove_child(&mut ctx.doc, parent, child)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_get_parent(handle: u32) -> u32 {
    ffi_wrap_handle(|| {
        let ctx = context_read()?;
        ctx.doc.validate_handle(handle)?;
        Ok(ctx.doc.node(handle).and_then(|n| n.parent).unwrap_or(0))
    })
}

// ============================================================================
// Content & Attributes
// ============================================================================

#[no_mangle]
pub extern "C" fn gnav_set_text(handle: u32, ptr: *const u8, len: u32) -> i32 {
    ffi_wrap(|| {
        let text = str_arg(ptr, len)?.to_string();
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        if let Some(node) = ctx.doc.nodes.get_mut(&handle) {
            node.text = text;
        }
        tree::mark_dirty(&mut ctx.doc, handle);
        Ok(0)
    })
}

/// `aria-haspopup`.
#[no_mangle]
pub extern "C" fn gnav_set_haspopup(handle: u32, value: u8) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        if let Some(node) = ctx.doc.nodes.get_mut(&handle) {
            node.aria_haspopup = value != 0;
        }
        Ok(0)
    })
}

/// `aria-expanded` as written by the host: 0 false, 1 true, anything else
/// removes the attribute.
#[no_mangle]
pub extern "C" fn gnav_set_expanded(handle: u32, value: u8) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        if let Some(node) = ctx.doc.nodes.get_mut(&handle) {
            node.aria_expanded = match value {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            };
        }
        tree::mark_dirty(&mut ctx.doc, handle);
        Ok(0)
    })
}

/// 1 = true, 0 = false, -1 = attribute absent.
#[no_mangle]
pub extern "C" fn gnav_get_expanded(handle: u32) -> i32 {
    ffi_wrap(|| {
        let ctx = context_read()?;
        ctx.doc.validate_handle(handle)?;
        Ok(match ctx.doc.node(handle).and_then(|n| n.aria_expanded) {
            Some(true) => 1,
            Some(false) => 0,
            None => -1,
        })
    })
}

/// Mark the analytics attribute present (or absent) on a trigger.
#[no_mangle]
pub extern "C" fn gnav_set_analytics(handle: u32, present: u8) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        if let Some(node) = ctx.doc.nodes.get_mut(&handle) {
            let state = if node.is_expanded() {
                AnalyticsState::Close
            } else {
                AnalyticsState::Open
            };
            node.analytics = (present != 0).then_some(state);
        }
        Ok(0)
    })
}

/// Copy the analytics label into `buffer`. Returns the byte length, 0 if absent.
#[no_mangle]
pub extern "C" fn gnav_get_analytics(handle: u32, buffer: *mut u8, buffer_len: u32) -> i32 {
    ffi_wrap(|| {
        let ctx = context_read()?;
        ctx.doc.validate_handle(handle)?;
        let label = ctx
            .doc
            .node(handle)
            .and_then(|n| n.analytics)
            .map_or("", |a| a.label());
        Ok(copy_out(label.as_bytes(), buffer, buffer_len))
    })
}

/// The host marks a nav item as holding a full-width popup.
#[no_mangle]
pub extern "C" fn gnav_set_full_width(handle: u32, value: u8) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        if ctx.doc.kind(handle) != Some(NodeKind::NavItem) {
            return Err(NavError::WrongKind {
                handle,
                expected: "nav item",
            });
        }
        if let Some(node) = ctx.doc.nodes.get_mut(&handle) {
            node.classes.set(NodeClasses::FULL_WIDTH, value != 0);
        }
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_get_classes(handle: u32) -> i32 {
    ffi_wrap(|| {
        let ctx = context_read()?;
        ctx.doc.validate_handle(handle)?;
        Ok(ctx.doc.node(handle).map_or(0, |n| n.classes.bits() as i32))
    })
}

// ============================================================================
// Author Style
// ============================================================================

/// Author `display: none`.
#[no_mangle]
pub extern "C" fn gnav_set_display_none(handle: u32, value: u8) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        if let Some(node) = ctx.doc.nodes.get_mut(&handle) {
            node.display_none = value != 0;
        }
        tree::mark_dirty(&mut ctx.doc, handle);
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_set_visibility_hidden(handle: u32, value: u8) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        if let Some(node) = ctx.doc.nodes.get_mut(&handle) {
            node.visibility_hidden = value != 0;
        }
        Ok(0)
    })
}

/// 0 always shown, 1 desktop only, 2 mobile only.
#[no_mangle]
pub extern "C" fn gnav_set_breakpoint(handle: u32, rule: u8) -> i32 {
    ffi_wrap(|| {
        let rule = Breakpoint::from_u8(rule).ok_or(NavError::InvalidBreakpoint(rule))?;
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        if let Some(node) = ctx.doc.nodes.get_mut(&handle) {
            node.breakpoint = rule;
        }
        tree::mark_dirty(&mut ctx.doc, handle);
        Ok(0)
    })
}

// ============================================================================
// Layout
// ============================================================================

/// prop: 0 width, 1 height, 2 min-width, 3 min-height, 4 max-width,
/// 5 max-height. unit: 0 auto, 1 px, 2 percent.
#[no_mangle]
pub extern "C" fn gnav_set_dimension(handle: u32, prop: u32, value: f32, unit: u8) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        layout::set_dimension(&mut ctx.doc, handle, prop, value, unit)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_set_size(handle: u32, width: f32, height: f32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        layout::set_size(&mut ctx.doc, handle, width, height)?;
        Ok(0)
    })
}

/// 0 row, 1 column.
#[no_mangle]
pub extern "C" fn gnav_set_flex_direction(handle: u32, value: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        layout::set_direction(&mut ctx.doc, handle, value)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_compute_layout() -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        layout::compute_layout(&mut ctx.doc)?;
        Ok(0)
    })
}

/// Absolute border box of a node, in CSS pixels.
#[no_mangle]
pub extern "C" fn gnav_get_layout(
    handle: u32,
    x: *mut f32,
    y: *mut f32,
    width: *mut f32,
    height: *mut f32,
) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        let rect = layout::absolute_box(&mut ctx.doc, handle)?;
        unsafe {
            if !x.is_null() {
                *x = rect.x;
            }
            if !y.is_null() {
                *y = rect.y;
            }
            if !width.is_null() {
                *width = rect.width;
            }
            if !height.is_null() {
                *height = rect.height;
            }
        }
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_is_visible(handle: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.validate_handle(handle)?;
        Ok(visibility::is_visible(&mut ctx.doc, handle) as i32)
    })
}

// ============================================================================
// Markup
// ============================================================================

/// Load a JSON header description and make it the root. Returns the root handle.
#[no_mangle]
pub extern "C" fn gnav_load_markup(ptr: *const u8, len: u32) -> u32 {
    ffi_wrap_handle(|| {
        let json = str_arg(ptr, len)?;
        let mut ctx = context_write()?;
        let loaded = markup::load_markup(&mut ctx.doc, json)?;
        ctx.markup_ids.extend(loaded.ids);
        ctx.menu.destroy();
        Ok(loaded.root)
    })
}

/// Insert a lazily rendered subtree under `parent`. Returns its root handle.
#[no_mangle]
pub extern "C" fn gnav_attach_markup(parent: u32, ptr: *const u8, len: u32) -> u32 {
    ffi_wrap_handle(|| {
        let json = str_arg(ptr, len)?;
        let mut ctx = context_write()?;
        let loaded = markup::attach_markup(&mut ctx, parent, json)?;
        ctx.markup_ids.extend(loaded.ids);
        Ok(loaded.root)
    })
}

/// Handle of a node named in loaded markup, 0 if unknown.
#[no_mangle]
pub extern "C" fn gnav_lookup_id(ptr: *const u8, len: u32) -> u32 {
    ffi_wrap_handle(|| {
        let name = str_arg(ptr, len)?;
        let ctx = context_read()?;
        Ok(ctx.markup_ids.get(name).copied().unwrap_or(0))
    })
}

// ============================================================================
// Menu
// ============================================================================

/// Discover the top-level items now. Input calls do this lazily.
#[no_mangle]
pub extern "C" fn gnav_init_menu() -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        let ctx = &mut *ctx;
        ctx.menu.reset(&mut ctx.doc);
        Ok(ctx.menu.items.len() as i32)
    })
}

#[no_mangle]
pub extern "C" fn gnav_destroy_menu() -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.menu.destroy();
        Ok(0)
    })
}

// ============================================================================
// Input
// ============================================================================

/// Route a keydown. `code` is `KeyboardEvent.code`; when empty the numeric
/// `key_code` is used. Returns 1 when consumed (call `preventDefault()`),
/// 0 otherwise.
#[no_mangle]
pub extern "C" fn gnav_dispatch_key(
    target: u32,
    code_ptr: *const u8,
    code_len: u32,
    key_code: u32,
    shift: u8,
) -> i32 {
    ffi_wrap(|| {
        let code = str_arg(code_ptr, code_len)?;
        let Some(key) = NavKey::resolve(code, key_code) else {
            return Ok(0);
        };
        let mut ctx = context_write()?;
        Ok(event::dispatch_key(&mut ctx, target, key, shift != 0) as i32)
    })
}

#[no_mangle]
pub extern "C" fn gnav_click(target: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        Ok(event::click(&mut ctx, target) as i32)
    })
}

/// Focus moved natively. `related` is the node that lost focus, 0 for none.
#[no_mangle]
pub extern "C" fn gnav_notify_focus(target: u32, related: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        event::notify_focus(&mut ctx, target, related);
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_resize(width: f32, height: f32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        event::resize(&mut ctx, width, height);
        Ok(0)
    })
}

/// Queue a keydown for the next `gnav_read_input`.
#[no_mangle]
pub extern "C" fn gnav_queue_key(target: u32, key_code: u32, shift: u8) -> i32 {
    ffi_wrap(|| {
        let Some(key) = NavKey::from_key_code(key_code) else {
            return Ok(0);
        };
        let mut ctx = context_write()?;
        ctx.doc.backend.push_event(HostInputEvent::Key {
            target,
            key,
            shift: shift != 0,
        });
        Ok(1)
    })
}

#[no_mangle]
pub extern "C" fn gnav_queue_click(target: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc.backend.push_event(HostInputEvent::Click { target });
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_queue_focus(target: u32, related: u32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc
            .backend
            .push_event(HostInputEvent::FocusIn { target, related });
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn gnav_queue_resize(width: f32, height: f32) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        ctx.doc
            .backend
            .push_event(HostInputEvent::Resize { width, height });
        Ok(0)
    })
}

/// Drain queued input. Returns the number of input events processed.
#[no_mangle]
pub extern "C" fn gnav_read_input() -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        Ok(event::read_input(&mut ctx) as i32)
    })
}

// ============================================================================
// Output
// ============================================================================

/// Drain one side effect. Returns 1 if `out` was written, 0 if empty.
#[no_mangle]
pub extern "C" fn gnav_next_event(out: *mut NavEvent) -> i32 {
    ffi_wrap(|| {
        let mut ctx = context_write()?;
        match event::next_event(&mut ctx) {
            Some(evt) => {
                if !out.is_null() {
                    unsafe {
                        *out = evt;
                    }
                }
                Ok(1)
            }
            None => Ok(0),
        }
    })
}

#[no_mangle]
pub extern "C" fn gnav_get_focused() -> u32 {
    ffi_wrap_handle(|| {
        let ctx = context_read()?;
        Ok(ctx.doc.focused.unwrap_or(0))
    })
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Copy `bytes` into a caller buffer, null-terminating when there is room.
fn copy_out(bytes: &[u8], buffer: *mut u8, buffer_len: u32) -> i32 {
    let copy_len = bytes.len().min(buffer_len as usize);
    if !buffer.is_null() && copy_len > 0 {
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, copy_len);
        }
    }
    if !buffer.is_null() && (buffer_len as usize) > copy_len {
        unsafe {
            *buffer.add(copy_len) = 0;
        }
    }
    copy_len as i32
}

/// Copy the last error message into `buffer`. Returns its byte length,
/// 0 when there is none.
#[no_mangle]
pub extern "C" fn gnav_get_last_error(buffer: *mut u8, buffer_len: u32) -> i32 {
    catch_unwind(AssertUnwindSafe(|| -> i32 {
        match context::get_last_error_snapshot() {
            Some(msg) => copy_out(msg.as_bytes(), buffer, buffer_len),
            None => 0,
        }
    }))
    .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn gnav_clear_error() {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        if let Ok(mut ctx) = context_write() {
            ctx.last_error.clear();
        }
    }));
}
