//! Event Module — Keyboard Event Router and host input.
//!
//! Responsibilities:
//! - Scope key events to the header region
//! - Classify the target (top-level item, popup link, headline, other)
//! - Dispatch to the menu controller, mirroring Left/Right in RTL
//! - Emulate native tab order across the flattened header sequence
//! - Drain queued host input and buffered side effects (poll-drain model)
//!
//! Every dispatch returns whether the key was consumed, which is the
//! host's cue to call `preventDefault()`.

use tracing::{debug, trace};

use crate::context::NavContext;
use crate::roving;
use crate::tree;
use crate::types::{HostInputEvent, NavEvent, NavKey, NodeKind};

// ============================================================================
// Entry points
// ============================================================================

/// Route one keydown. Returns true when the key was consumed.
pub(crate) fn dispatch_key(ctx: &mut NavContext, target: u32, key: NavKey, shift: bool) -> bool {
    if !in_region(ctx, target) {
        trace!(target, "key outside header ignored");
        return false;
    }
    ensure_menu(ctx);
    let key = mirror(ctx, key);

    if key == NavKey::Tab && cycle_open_search(ctx, target, shift) {
        return true;
    }

    let consumed = if let Some(position) = ctx.menu.position_of(target) {
        item_key(ctx, position, key, shift)
    } else if let Some(link) = ctx.menu.locate_link(target) {
        popup_key(ctx, target, link, key, shift)
    } else if let Some(headline) = ctx.menu.locate_headline(target) {
        headline_key(ctx, headline, key, shift)
    } else {
        global_key(ctx, target, key, shift)
    };
    debug!(target, ?key, shift, consumed, "dispatch_key");
    consumed
}

/// Pointer click on `target`.
pub(crate) fn click(ctx: &mut NavContext, target: u32) -> bool {
    if !in_region(ctx, target) {
        return false;
    }
    ensure_menu(ctx);
    ctx.menu.on_click(&mut ctx.doc, target)
}

/// Host-driven focus change (pointer, native tab order).
pub(crate) fn notify_focus(ctx: &mut NavContext, target: u32, related: u32) {
    ensure_menu(ctx);
    ctx.menu.on_focus(&mut ctx.doc, target, related);
}

pub(crate) fn resize(ctx: &mut NavContext, width: f32, height: f32) {
    ensure_menu(ctx);
    ctx.doc.backend.set_viewport(width, height);
    ctx.menu.on_resize(&mut ctx.doc);
}

/// Drain queued host input through the router.
/// Returns the number of input events processed.
pub(crate) fn read_input(ctx: &mut NavContext) -> usize {
    let raw_events = ctx.doc.backend.read_events();
    let count = raw_events.len();

    for raw in raw_events {
        match raw {
            HostInputEvent::Key { target, key, shift } => {
                dispatch_key(ctx, target, key, shift);
            }
            HostInputEvent::Click { target } => {
                click(ctx, target);
            }
            HostInputEvent::FocusIn { target, related } => notify_focus(ctx, target, related),
            HostInputEvent::Resize { width, height } => resize(ctx, width, height),
        }
    }

    count
}

/// Drain one side effect from the buffer. Returns None if empty.
pub(crate) fn next_event(ctx: &mut NavContext) -> Option<NavEvent> {
    if ctx.doc.event_buffer.is_empty() {
        None
    } else {
        Some(ctx.doc.event_buffer.remove(0))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn in_region(ctx: &NavContext, target: u32) -> bool {
    ctx.doc
        .root
        .is_some_and(|root| tree::is_descendant_of(&ctx.doc, target, root))
}

fn ensure_menu(ctx: &mut NavContext) {
    if !ctx.menu.is_initialized() {
        ctx.menu.init(&mut ctx.doc);
    }
}

fn mirror(ctx: &NavContext, key: NavKey) -> NavKey {
    if !ctx.doc.is_rtl() {
        return key;
    }
    match key {
        NavKey::ArrowLeft => NavKey::ArrowRight,
        NavKey::ArrowRight => NavKey::ArrowLeft,
        other => other,
    }
}

/// Focus a node the way a native focus change would, blur bookkeeping included.
fn move_focus(ctx: &mut NavContext, to: u32) {
    let from = ctx.doc.focused.unwrap_or(0);
    ctx.doc.focus(to);
    ctx.menu.on_focus(&mut ctx.doc, to, from);
}

/// Header elements in native tab order. Popup content is excluded; it is
/// only reached by diving in from its trigger.
fn tab_sequence(ctx: &NavContext, with_breadcrumbs: bool) -> Vec<u32> {
    let Some(root) = ctx.doc.root else {
        return Vec::new();
    };
    tree::find_all(&ctx.doc, root, |n| {
        n.kind.in_tab_sequence() && (with_breadcrumbs || n.kind != NodeKind::Breadcrumb)
    })
    .into_iter()
    .filter(|&h| tree::closest(&ctx.doc, h, NodeKind::Popup).is_none())
    .collect()
}

/// Native Tab from `from`. Returns false when focus would leave the header.
fn advance_sequence(ctx: &mut NavContext, from: u32, backward: bool) -> bool {
    let list = tab_sequence(ctx, true);
    let Some(position) = list.iter().position(|&h| h == from) else {
        return false;
    };
    let next = if backward {
        roving::previous_visible(&mut ctx.doc, &list, position as isize)
    } else {
        roving::next_visible(&mut ctx.doc, &list, position as isize)
    };
    let Some(next) = next else {
        return false;
    };
    move_focus(ctx, list[next]);
    true
}

/// With the search field open on desktop, Tab wraps within the header.
fn cycle_open_search(ctx: &mut NavContext, target: u32, shift: bool) -> bool {
    if !ctx.doc.is_desktop() {
        return false;
    }
    let list = tab_sequence(ctx, false);
    let search_open = list
        .iter()
        .any(|&h| ctx.doc.kind(h) == Some(NodeKind::SearchTrigger) && ctx.doc.is_expanded(h));
    if !search_open {
        return false;
    }

    let first = roving::next_visible(&mut ctx.doc, &list, -1);
    let last = roving::previous_visible(&mut ctx.doc, &list, list.len() as isize);
    let (Some(first), Some(last)) = (first, last) else {
        return false;
    };
    let (from, to) = if shift { (first, last) } else { (last, first) };
    if list[from] != target {
        return false;
    }
    debug!(from = list[from], to = list[to], "open search tab cycle");
    move_focus(ctx, list[to]);
    true
}

// ============================================================================
// Per-context handlers
// ============================================================================

fn item_key(ctx: &mut NavContext, position: usize, key: NavKey, shift: bool) -> bool {
    let doc = &mut ctx.doc;
    let menu = &mut ctx.menu;
    match key {
        NavKey::ArrowRight => {
            menu.move_to_next_item(doc, position, None, None);
            true
        }
        NavKey::ArrowLeft => {
            menu.move_to_previous_item(doc, position, None, None);
            true
        }
        NavKey::ArrowDown => {
            menu.move_down(doc, position);
            true
        }
        NavKey::ArrowUp => {
            menu.move_up(doc, position);
            true
        }
        NavKey::Escape => menu.escape(doc, position),
        NavKey::Enter | NavKey::Space => {
            if !menu.activate(doc, position) {
                doc.activate(menu.items[position].node);
            }
            true
        }
        NavKey::Tab => item_tab(ctx, position, shift),
    }
}

fn item_tab(ctx: &mut NavContext, position: usize, shift: bool) -> bool {
    let node = ctx.menu.items[position].node;
    let doc = &mut ctx.doc;
    let menu = &mut ctx.menu;

    if !shift {
        if menu.next_visible_item(doc, position as isize).is_none() {
            // Last item: its open popup still comes before whatever follows.
            if menu.is_item_expanded(position) {
                menu.move_down(doc, position);
                return true;
            }
            return advance_sequence(ctx, node, false);
        }
        if menu.popup_flag || menu.is_item_expanded(position) {
            menu.move_down(doc, position);
        } else {
            menu.move_to_next_item(doc, position, None, None);
        }
        true
    } else {
        if menu.previous_visible_item(doc, position as isize).is_none() {
            return advance_sequence(ctx, node, true);
        }
        if menu.popup_flag {
            menu.move_up(doc, position);
        } else {
            menu.move_to_previous_item(doc, position, None, None);
        }
        true
    }
}

fn popup_key(
    ctx: &mut NavContext,
    target: u32,
    (position, column, item): (usize, usize, usize),
    key: NavKey,
    shift: bool,
) -> bool {
    let doc = &mut ctx.doc;
    let menu = &mut ctx.menu;
    match key {
        NavKey::ArrowDown => menu.popup_down(doc, position, column, item),
        NavKey::ArrowUp => menu.popup_up(doc, position, column, item),
        NavKey::ArrowRight => menu.popup_right(doc, position, column, item),
        NavKey::ArrowLeft => menu.popup_left(doc, position, column, item),
        NavKey::Escape => menu.popup_escape(doc, position),
        NavKey::Enter | NavKey::Space => doc.activate(target),
        NavKey::Tab if shift => menu.popup_up(doc, position, column, item),
        NavKey::Tab => {
            if !menu.popup_tab(doc, position, column, item) {
                let trigger = menu.items[position].node;
                menu.close_all(doc);
                menu.popup_flag = false;
                return advance_sequence(ctx, trigger, false);
            }
        }
    }
    true
}

fn headline_key(
    ctx: &mut NavContext,
    (position, column, section): (usize, usize, usize),
    key: NavKey,
    shift: bool,
) -> bool {
    let doc = &mut ctx.doc;
    let menu = &mut ctx.menu;
    match key {
        NavKey::ArrowDown | NavKey::ArrowRight => menu.headline_down(doc, position, column, section),
        NavKey::Tab if !shift => menu.headline_down(doc, position, column, section),
        NavKey::ArrowUp | NavKey::ArrowLeft | NavKey::Tab => {
            menu.headline_up(doc, position, column, section)
        }
        NavKey::Escape => menu.popup_escape(doc, position),
        NavKey::Enter | NavKey::Space => menu.headline_toggle(doc, position, column, section),
    }
    true
}

/// Anything in the header that is not part of the menu.
fn global_key(ctx: &mut NavContext, target: u32, key: NavKey, shift: bool) -> bool {
    match key {
        NavKey::Tab => advance_sequence(ctx, target, shift),
        NavKey::Enter | NavKey::Space => {
            ctx.menu.on_click(&mut ctx.doc, target);
            ctx.doc.activate(target);
            true
        }
        NavKey::Escape => {
            if ctx.doc.kind(target) == Some(NodeKind::ProfileButton) && ctx.doc.is_expanded(target) {
                ctx.doc.set_expanded(target, false);
                return true;
            }
            false
        }
        NavKey::ArrowLeft | NavKey::ArrowUp | NavKey::ArrowRight | NavKey::ArrowDown => false,
    }
}
