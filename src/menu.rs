//! Menu Controller — the top-level item list.
//!
//! Responsibilities:
//! - Discover top-level items (links, CTAs, popup triggers) outside popups
//! - Roving focus between them, carrying "popup open" state across lateral moves
//! - Own the single open-popup reference and the pending focus intent of a
//!   popup whose subtree has not been inserted yet
//! - Host focus/click bookkeeping and breakpoint resets
//!
//! ARIA and class state written to the document is a projection of the
//! fields held here, never the other way around.

use tracing::debug;

use crate::context::Document;
use crate::model;
use crate::popup::{self, Popup, PopupMove, PopupPhase};
use crate::roving;
use crate::tree;
use crate::types::{FocusHint, NodeClasses, NodeKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MenuItem {
    pub node: u32,
    pub position: usize,
    pub has_popup: bool,
    pub popup: Option<Popup>,
    pub phase: PopupPhase,
}

/// Focus placement waiting for a lazily inserted popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingFocus {
    pub position: usize,
    pub target: Option<FocusHint>,
}

#[derive(Debug, Default)]
pub struct Menu {
    pub(crate) items: Vec<MenuItem>,
    pub(crate) index: Option<usize>,
    /// Whether lateral moves re-open the destination's popup.
    pub(crate) popup_flag: bool,
    pub(crate) open: Option<usize>,
    pub(crate) pending: Option<PendingFocus>,
    pub(crate) desktop_breakpoint: f32,
    cached_width: f32,
    initialized: bool,
}

impl Menu {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Discover the top-level items. Without a root this silently leaves
    /// the menu empty.
    pub(crate) fn init(&mut self, doc: &mut Document) {
        self.items.clear();
        self.index = None;
        self.open = None;
        self.pending = None;
        self.desktop_breakpoint = doc.config.desktop_breakpoint();
        self.cached_width = doc.viewport_width();
        self.initialized = true;

        let Some(root) = doc.root else {
            return;
        };
        let scope = if doc.kind(root) == Some(NodeKind::MainNav) {
            root
        } else {
            tree::find_first(doc, root, NodeKind::MainNav).unwrap_or(root)
        };

        let nodes: Vec<u32> = tree::find_all(doc, scope, |n| n.kind.is_top_level())
            .into_iter()
            .filter(|&h| tree::closest(doc, h, NodeKind::Popup).is_none())
            .collect();

        for (position, node) in nodes.into_iter().enumerate() {
            let mut popup = Popup::discover(doc, node);
            let has_popup = popup.is_some() || doc.node(node).is_some_and(|n| n.aria_haspopup);
            let phase = match &popup {
                Some(p) if p.is_expanded(doc) => PopupPhase::Expanded,
                _ => PopupPhase::Closed,
            };
            if phase == PopupPhase::Expanded {
                // Already open: its items stay reachable without a re-expand.
                if let Some(p) = popup.as_mut() {
                    p.columns = model::build_columns(doc, p.node);
                }
                self.open = Some(position);
            }
            self.items.push(MenuItem {
                node,
                position,
                has_popup,
                popup,
                phase,
            });
        }
        debug!(
            items = self.items.len(),
            breakpoint = self.desktop_breakpoint,
            "menu init"
        );
    }

    /// Drop all items and state.
    pub(crate) fn destroy(&mut self) {
        *self = Self::default();
    }

    /// Rediscover items, e.g. after the layout swapped item sets.
    pub(crate) fn reset(&mut self, doc: &mut Document) {
        self.destroy();
        self.init(doc);
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    fn nodes(&self) -> Vec<u32> {
        self.items.iter().map(|i| i.node).collect()
    }

    pub(crate) fn position_of(&self, node: u32) -> Option<usize> {
        self.items.iter().position(|i| i.node == node)
    }

    pub(crate) fn item_has_popup(&self, position: usize) -> bool {
        self.items.get(position).is_some_and(|i| i.has_popup)
    }

    pub(crate) fn is_item_expanded(&self, position: usize) -> bool {
        self.open == Some(position)
            || self
                .items
                .get(position)
                .is_some_and(|i| i.phase == PopupPhase::Expanding)
    }

    /// Top-level item, column and position of a popup link.
    pub(crate) fn locate_link(&self, link: u32) -> Option<(usize, usize, usize)> {
        self.items.iter().enumerate().find_map(|(p, item)| {
            let (c, pos) = item.popup.as_ref()?.locate(link)?;
            Some((p, c, pos))
        })
    }

    /// Top-level item, column and section of a popup headline.
    pub(crate) fn locate_headline(&self, headline: u32) -> Option<(usize, usize, usize)> {
        self.items.iter().enumerate().find_map(|(p, item)| {
            let (c, s) = item.popup.as_ref()?.locate_headline(headline)?;
            Some((p, c, s))
        })
    }

    pub(crate) fn next_visible_item(&self, doc: &mut Document, position: isize) -> Option<usize> {
        roving::next_visible(doc, &self.nodes(), position)
    }

    pub(crate) fn previous_visible_item(&self, doc: &mut Document, position: isize) -> Option<usize> {
        roving::previous_visible(doc, &self.nodes(), position)
    }

    // ========================================================================
    // Popup state
    // ========================================================================

    /// Close every popup and headline; the menu holds no open reference after.
    pub(crate) fn close_all(&mut self, doc: &mut Document) {
        self.close_popups(doc, false);
    }

    fn close_popups(&mut self, doc: &mut Document, highlight_parent: bool) {
        popup::close_all(doc, highlight_parent);
        for item in &mut self.items {
            if item.phase == PopupPhase::Expanding {
                popup::collapse_trigger(doc, item.node);
            }
            item.phase = PopupPhase::Closed;
        }
        self.open = None;
        self.pending = None;
    }

    /// Open the popup of `position`, closing any other first. A popup not
    /// yet in the tree leaves a pending focus intent behind.
    pub(crate) fn expand_item(&mut self, doc: &mut Document, position: usize, hint: Option<FocusHint>) {
        if position >= self.items.len() {
            return;
        }
        self.close_all(doc);

        let item = &mut self.items[position];
        if item.popup.is_none() {
            item.popup = Popup::discover(doc, item.node);
            item.has_popup |= item.popup.is_some();
        }

        if item.popup.is_none() {
            popup::expand_trigger(doc, item.node);
            item.phase = PopupPhase::Expanding;
            self.pending = Some(PendingFocus {
                position,
                target: hint,
            });
            debug!(position, ?hint, "pending focus intent registered");
            return;
        }

        if let Some(p) = item.popup.as_mut() {
            p.expand(doc);
            if let Some(hint) = hint {
                p.focus(doc, hint);
            }
        }
        item.phase = PopupPhase::Expanded;
        self.open = Some(position);
    }

    /// Tree-mutation notification. Resolves the pending focus intent once
    /// the popup subtree is observable.
    pub(crate) fn on_tree_mutation(&mut self, doc: &mut Document, parent: u32) {
        let Some(pending) = self.pending else {
            return;
        };
        let Some(item) = self.items.get(pending.position) else {
            self.pending = None;
            return;
        };
        // Collapsed again before the subtree arrived.
        if item.phase != PopupPhase::Expanding || !doc.is_expanded(item.node) {
            debug!(position = pending.position, "pending focus intent dropped");
            self.pending = None;
            return;
        }
        if Popup::discover(doc, item.node).is_none() {
            return;
        }
        debug!(position = pending.position, parent, "pending focus intent resolved");
        self.pending = None;
        self.expand_item(doc, pending.position, pending.target);
    }

    /// Move focus to an item without touching its popup.
    pub(crate) fn move_to_item(&mut self, doc: &mut Document, position: usize) {
        let Some(item) = self.items.get(position) else {
            return;
        };
        doc.focus(item.node);
        self.index = Some(position);
    }

    /// Shared part of next/previous: close what is being left, focus the
    /// destination, expand it when requested or when the flag says so.
    fn move_from_to(
        &mut self,
        doc: &mut Document,
        from: usize,
        to: usize,
        expand: Option<bool>,
        hint: Option<FocusHint>,
    ) {
        if self.item_has_popup(from) {
            if self.is_item_expanded(from) {
                self.close_all(doc);
            }
        } else {
            self.popup_flag = false;
        }

        let should_expand = expand.unwrap_or(self.popup_flag);
        if let Some(item) = self.items.get(to) {
            doc.focus(item.node);
        }
        if should_expand && self.item_has_popup(to) {
            self.expand_item(doc, to, hint);
        }
        self.index = Some(to);
    }

    /// Returns false at the boundary (no wrap).
    pub(crate) fn move_to_next_item(
        &mut self,
        doc: &mut Document,
        position: usize,
        expand: Option<bool>,
        hint: Option<FocusHint>,
    ) -> bool {
        if !self.has_items() {
            return false;
        }
        let Some(next) = self.next_visible_item(doc, position as isize) else {
            return false;
        };
        self.move_from_to(doc, position, next, expand, hint);
        true
    }

    /// Returns false at the boundary (no wrap).
    pub(crate) fn move_to_previous_item(
        &mut self,
        doc: &mut Document,
        position: usize,
        expand: Option<bool>,
        hint: Option<FocusHint>,
    ) -> bool {
        if !self.has_items() {
            return false;
        }
        let Some(previous) = self.previous_visible_item(doc, position as isize) else {
            return false;
        };
        self.move_from_to(doc, position, previous, expand, hint);
        true
    }

    // ========================================================================
    // Top-level item actions
    // ========================================================================

    /// Click/Enter/Space on an item. Returns true when it toggled a popup;
    /// plain links are left to the caller.
    pub(crate) fn activate(&mut self, doc: &mut Document, position: usize) -> bool {
        if position >= self.items.len() {
            return false;
        }
        self.index = Some(position);
        if !self.item_has_popup(position) {
            return false;
        }
        if self.is_item_expanded(position) {
            self.close_all(doc);
            self.popup_flag = false;
        } else {
            if doc.config.sticky_header {
                doc.scroll_into_view(self.items[position].node);
            }
            self.expand_item(doc, position, None);
            self.popup_flag = true;
        }
        true
    }

    /// Down: open and enter the popup, or continue to the next item.
    pub(crate) fn move_down(&mut self, doc: &mut Document, position: usize) {
        if !self.item_has_popup(position) {
            self.move_to_next_item(doc, position, None, None);
            return;
        }
        if !self.is_item_expanded(position) {
            self.expand_item(doc, position, Some(FocusHint::First));
            self.popup_flag = true;
            return;
        }
        // Subtree still loading: the key lands once the mutation fires.
        if self.items[position].phase == PopupPhase::Expanding {
            if let Some(pending) = self.pending.as_mut().filter(|p| p.position == position) {
                pending.target = Some(FocusHint::First);
                debug!(position, "pending focus intent retargeted");
            }
            return;
        }
        let outcome = match self.items[position].popup.as_mut() {
            Some(p) => p.move_to_first_item(doc),
            None => PopupMove::Stay,
        };
        self.resolve(doc, position, outcome);
    }

    /// Up: leave an open popup for the previous item's last popup entry.
    pub(crate) fn move_up(&mut self, doc: &mut Document, position: usize) {
        if self.item_has_popup(position) && self.is_item_expanded(position) {
            self.close_all(doc);
            self.move_to_previous_item(doc, position, Some(true), Some(FocusHint::Last));
        } else {
            self.move_to_previous_item(doc, position, None, None);
        }
    }

    /// Escape on an item collapses its popup.
    pub(crate) fn escape(&mut self, doc: &mut Document, position: usize) -> bool {
        if self.item_has_popup(position) && self.is_item_expanded(position) {
            self.close_all(doc);
            self.popup_flag = false;
            return true;
        }
        false
    }

    // ========================================================================
    // Popup actions
    // ========================================================================

    /// Apply a popup move's exit to the top-level list.
    fn resolve(&mut self, doc: &mut Document, position: usize, outcome: PopupMove) {
        match outcome {
            PopupMove::Moved | PopupMove::Stay => {}
            PopupMove::ExitToTrigger => self.move_to_item(doc, position),
            PopupMove::ExitToNextItem => {
                if !self.move_to_next_item(doc, position, None, None) {
                    self.move_to_item(doc, position);
                }
            }
        }
    }

    fn with_popup(
        &mut self,
        doc: &mut Document,
        position: usize,
        f: impl FnOnce(&mut Popup, &mut Document) -> PopupMove,
    ) -> PopupMove {
        match self.items.get_mut(position).and_then(|i| i.popup.as_mut()) {
            Some(p) => f(p, doc),
            None => PopupMove::Stay,
        }
    }

    pub(crate) fn popup_down(&mut self, doc: &mut Document, position: usize, column: usize, item: usize) {
        let outcome = self.with_popup(doc, position, |p, d| p.move_down(d, column, item));
        self.resolve(doc, position, outcome);
    }

    pub(crate) fn popup_up(&mut self, doc: &mut Document, position: usize, column: usize, item: usize) {
        let outcome = self.with_popup(doc, position, |p, d| p.move_up(d, column, item));
        self.resolve(doc, position, outcome);
    }

    pub(crate) fn popup_right(&mut self, doc: &mut Document, position: usize, column: usize, item: usize) {
        let outcome = self.with_popup(doc, position, |p, d| p.move_right(d, column, item));
        self.resolve(doc, position, outcome);
    }

    pub(crate) fn popup_left(&mut self, doc: &mut Document, position: usize, column: usize, item: usize) {
        let outcome = self.with_popup(doc, position, |p, d| p.move_left(d, column, item));
        self.resolve(doc, position, outcome);
    }

    /// Tab inside a popup. Returns false when the popup is left past its
    /// trigger and no later top-level item exists.
    pub(crate) fn popup_tab(&mut self, doc: &mut Document, position: usize, column: usize, item: usize) -> bool {
        let outcome = self.with_popup(doc, position, |p, d| p.move_down(d, column, item));
        match outcome {
            PopupMove::ExitToNextItem => self.move_to_next_item(doc, position, None, None),
            other => {
                self.resolve(doc, position, other);
                true
            }
        }
    }

    /// Escape inside a popup: close everything and return to the trigger.
    pub(crate) fn popup_escape(&mut self, doc: &mut Document, position: usize) {
        self.close_popups(doc, true);
        self.move_to_item(doc, position);
        self.popup_flag = false;
    }

    pub(crate) fn headline_down(&mut self, doc: &mut Document, position: usize, column: usize, section: usize) {
        let outcome =
            self.with_popup(doc, position, |p, d| p.move_down_from_headline(d, column, section));
        self.resolve(doc, position, outcome);
    }

    pub(crate) fn headline_up(&mut self, doc: &mut Document, position: usize, column: usize, section: usize) {
        let outcome =
            self.with_popup(doc, position, |p, d| p.move_up_from_headline(d, column, section));
        self.resolve(doc, position, outcome);
    }

    /// Enter/Space on a headline toggles its section.
    pub(crate) fn headline_toggle(&mut self, doc: &mut Document, position: usize, column: usize, section: usize) {
        let Some(col) = self
            .items
            .get(position)
            .and_then(|i| i.popup.as_ref())
            .and_then(|p| p.columns.get(column))
        else {
            return;
        };
        if col.is_section_expanded(doc, section) {
            model::close_all_headlines(doc, true);
        } else {
            col.expand_section(doc, section);
            if let Some(headline) = col.sections.get(section).and_then(|s| s.headline) {
                doc.focus(headline);
            }
        }
    }

    // ========================================================================
    // Host notifications
    // ========================================================================

    /// Focus moved to `target`; `related` lost it (0 for none).
    pub(crate) fn on_focus(&mut self, doc: &mut Document, target: u32, related: u32) {
        let target_kind = doc.kind(target);

        if let Some((p, c, _)) = self.locate_link(related) {
            if let Some(popup) = self.items[p].popup.as_mut() {
                popup.set_index(c, None);
            }
        }

        let left_menu = self.position_of(related).is_some();
        let left_popup = doc.kind(related) == Some(NodeKind::Link)
            || doc.kind(related) == Some(NodeKind::Headline);
        let stays_in_nav = matches!(
            target_kind,
            Some(NodeKind::NavLink | NodeKind::Link | NodeKind::Headline)
        );
        if (left_menu || left_popup) && target != 0 && !stays_in_nav {
            self.close_all(doc);
            if left_menu {
                self.popup_flag = false;
            }
        }

        if let Some(p) = self.position_of(target) {
            self.index = Some(p);
        } else if let Some((p, c, pos)) = self.locate_link(target) {
            if let Some(popup) = self.items[p].popup.as_mut() {
                popup.set_index(c, Some(pos));
            }
        }
        doc.focused = doc.nodes.contains_key(&target).then_some(target);
    }

    /// Pointer click. Triggers toggle; clicks outside any trigger
    /// container close open popups.
    pub(crate) fn on_click(&mut self, doc: &mut Document, target: u32) -> bool {
        if let Some(p) = self.position_of(target) {
            return self.activate(doc, p);
        }
        if let Some((p, c, pos)) = self.locate_link(target) {
            if let Some(popup) = self.items[p].popup.as_mut() {
                popup.set_index(c, Some(pos));
            }
        }

        let inside_trigger = tree::closest(doc, target, NodeKind::NavItem).is_some_and(|container| {
            self.items.iter().any(|i| {
                i.has_popup && doc.node(i.node).and_then(|n| n.parent) == Some(container)
            })
        });
        let any_open = self.open.is_some()
            || !doc.nodes_with_class(NodeClasses::OPEN_POPUP).is_empty();
        if any_open && !inside_trigger {
            self.close_all(doc);
            return true;
        }
        false
    }

    /// Viewport changed. Crossing the breakpoint closes everything and
    /// rediscovers the item list.
    pub(crate) fn on_resize(&mut self, doc: &mut Document) {
        let width = doc.viewport_width();
        let breakpoint = self.desktop_breakpoint;
        let crossed = (self.cached_width >= breakpoint) != (width >= breakpoint);
        self.cached_width = width;
        if !crossed {
            return;
        }
        debug!(width, breakpoint, "breakpoint crossed, resetting menu");
        self.close_all(doc);
        self.popup_flag = false;
        self.init(doc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NavContext;
    use crate::host::MockBackend;
    use crate::markup;
    use crate::types::AnalyticsState;

    const NAV: &str = r#"{"kind": "header", "children": [
        {"kind": "main_nav", "children": [
            {"kind": "nav_item", "children": [{"kind": "nav_link", "id": "home", "text": "Home"}]},
            {"kind": "nav_item", "id": "products_item", "children": [
                {"kind": "nav_link", "id": "products", "text": "Products",
                 "haspopup": true, "expanded": false, "analytics": true},
                {"kind": "popup", "id": "products_popup", "children": [
                    {"kind": "column", "children": [{"kind": "link", "id": "p11"}, {"kind": "link", "id": "p12"}]},
                    {"kind": "column", "children": [{"kind": "link", "id": "p21"}, {"kind": "link", "id": "p22"}]}
                ]}
            ]},
            {"kind": "nav_item", "id": "apps_item", "children": [
                {"kind": "nav_link", "id": "apps", "text": "Apps", "haspopup": true, "expanded": false},
                {"kind": "popup", "id": "apps_popup", "children": [
                    {"kind": "column", "children": [{"kind": "link", "id": "a11"}, {"kind": "link", "id": "a12"}]}
                ]}
            ]},
            {"kind": "nav_item", "children": [{"kind": "nav_link", "id": "pricing", "text": "Pricing"}]},
            {"kind": "nav_item", "children": [{"kind": "cta", "id": "cta", "text": "Buy"}]}
        ]},
        {"kind": "container", "id": "outside", "width": 10, "height": 10}
    ]}"#;

    fn test_ctx(width: f32, json: &str) -> (NavContext, markup::Loaded) {
        let mut ctx = NavContext::new(Box::new(MockBackend::new(width, 800.0)));
        let loaded = markup::load_markup(&mut ctx.doc, json).unwrap();
        ctx.menu.init(&mut ctx.doc);
        ctx.doc.event_buffer.clear();
        (ctx, loaded)
    }

    fn expanded_popups(ctx: &NavContext) -> usize {
        ctx.doc.nodes_with_class(NodeClasses::OPEN_POPUP).len()
    }

    #[test]
    fn test_init_discovers_top_level_items() {
        let (ctx, ids) = test_ctx(1280.0, NAV);
        let nodes: Vec<u32> = ctx.menu.items.iter().map(|i| i.node).collect();
        assert_eq!(
            nodes,
            vec![ids.id("home"), ids.id("products"), ids.id("apps"), ids.id("pricing"), ids.id("cta")]
        );
        assert!(ctx.menu.items[1].has_popup);
        assert!(!ctx.menu.items[0].has_popup);
        assert_eq!(ctx.menu.desktop_breakpoint, 1200.0);
    }

    #[test]
    fn test_init_without_root_is_empty() {
        let mut ctx = NavContext::new(Box::new(MockBackend::new(1280.0, 800.0)));
        ctx.menu.init(&mut ctx.doc);
        assert!(ctx.menu.is_initialized());
        assert!(!ctx.menu.has_items());
        assert!(!ctx.menu.move_to_next_item(&mut ctx.doc, 0, None, None));
    }

    #[test]
    fn test_expanding_one_popup_collapses_the_other() {
        let (mut ctx, ids) = test_ctx(1280.0, NAV);
        ctx.menu.expand_item(&mut ctx.doc, 1, None);
        ctx.menu.expand_item(&mut ctx.doc, 2, None);

        assert_eq!(expanded_popups(&ctx), 1);
        assert!(ctx.doc.has_class(ids.id("apps_popup"), NodeClasses::OPEN_POPUP));
        assert_eq!(ctx.doc.nodes[&ids.id("products")].aria_expanded, Some(false));
        assert_eq!(ctx.doc.nodes[&ids.id("products")].analytics, Some(AnalyticsState::Open));
        assert_eq!(ctx.menu.open, Some(2));
    }

    #[test]
    fn test_lateral_moves_stop_at_boundaries() {
        let (mut ctx, ids) = test_ctx(1280.0, NAV);
        ctx.menu.move_to_item(&mut ctx.doc, 0);
        assert!(!ctx.menu.move_to_previous_item(&mut ctx.doc, 0, None, None));
        assert_eq!(ctx.doc.focused, Some(ids.id("home")));

        ctx.menu.move_to_item(&mut ctx.doc, 4);
        assert!(!ctx.menu.move_to_next_item(&mut ctx.doc, 4, None, None));
        assert_eq!(ctx.doc.focused, Some(ids.id("cta")));
    }

    #[test]
    fn test_right_then_left_returns_home_with_nothing_open() {
        let (mut ctx, ids) = test_ctx(1280.0, NAV);
        for n in 1..=4 {
            ctx.menu.move_to_item(&mut ctx.doc, 0);
            for p in 0..n {
                assert!(ctx.menu.move_to_next_item(&mut ctx.doc, p, None, None));
            }
            for p in (1..=n).rev() {
                assert!(ctx.menu.move_to_previous_item(&mut ctx.doc, p, None, None));
            }
            assert_eq!(ctx.doc.focused, Some(ids.id("home")));
            assert_eq!(expanded_popups(&ctx), 0);
        }
    }

    #[test]
    fn test_popup_flag_carries_across_lateral_moves() {
        let (mut ctx, ids) = test_ctx(1280.0, NAV);
        assert!(ctx.menu.activate(&mut ctx.doc, 1));
        assert!(ctx.menu.popup_flag);

        ctx.menu.move_to_next_item(&mut ctx.doc, 1, None, None);
        assert!(ctx.doc.has_class(ids.id("apps_popup"), NodeClasses::OPEN_POPUP));
        assert_eq!(ctx.doc.focused, Some(ids.id("apps")));

        // Leaving through a plain link drops the flag.
        ctx.menu.move_to_next_item(&mut ctx.doc, 2, None, None);
        ctx.menu.move_to_next_item(&mut ctx.doc, 3, None, None);
        assert!(!ctx.menu.popup_flag);
        assert_eq!(expanded_popups(&ctx), 0);
    }

    #[test]
    fn test_activate_toggles_and_requests_scroll_when_sticky() {
        let (mut ctx, ids) = test_ctx(1280.0, NAV);
        ctx.doc.config.sticky_header = true;
        assert!(ctx.menu.activate(&mut ctx.doc, 1));
        assert!(ctx
            .doc
            .event_buffer
            .contains(&crate::types::NavEvent::scroll_into_view(ids.id("products"))));
        assert!(ctx.menu.activate(&mut ctx.doc, 1));
        assert_eq!(expanded_popups(&ctx), 0);
        assert!(!ctx.menu.popup_flag);
        assert!(!ctx.menu.activate(&mut ctx.doc, 0));
    }

    #[test]
    fn test_up_from_open_trigger_enters_previous_popup_last_item() {
        let (mut ctx, ids) = test_ctx(1280.0, NAV);
        ctx.menu.expand_item(&mut ctx.doc, 2, None);
        ctx.menu.move_up(&mut ctx.doc, 2);
        assert!(ctx.doc.has_class(ids.id("products_popup"), NodeClasses::OPEN_POPUP));
        assert!(!ctx.doc.has_class(ids.id("apps_popup"), NodeClasses::OPEN_POPUP));
        assert_eq!(ctx.doc.focused, Some(ids.id("p22")));
    }

    #[test]
    fn test_pending_focus_resolves_on_mutation() {
        let json = r#"{"kind": "header", "children": [{"kind": "main_nav", "children": [
            {"kind": "nav_item", "id": "item", "children": [
                {"kind": "nav_link", "id": "trigger", "haspopup": true, "expanded": false}
            ]}
        ]}]}"#;
        let (mut ctx, ids) = test_ctx(1280.0, json);
        assert!(ctx.menu.item_has_popup(0));

        ctx.menu.move_down(&mut ctx.doc, 0);
        assert_eq!(ctx.menu.items[0].phase, PopupPhase::Expanding);
        assert!(ctx.doc.is_expanded(ids.id("trigger")));
        assert!(ctx.menu.pending.is_some());

        let popup = markup::attach_markup(
            &mut ctx,
            ids.id("item"),
            r#"{"kind": "popup", "children": [{"kind": "column", "children": [{"kind": "link", "id": "first"}]}]}"#,
        )
        .unwrap();
        assert!(ctx.menu.pending.is_none());
        assert_eq!(ctx.menu.open, Some(0));
        assert_eq!(ctx.doc.focused, Some(popup.id("first")));
    }

    #[test]
    fn test_down_while_loading_is_applied_on_mutation() {
        let json = r#"{"kind": "header", "children": [{"kind": "main_nav", "children": [
            {"kind": "nav_item", "id": "item", "children": [
                {"kind": "nav_link", "id": "trigger", "haspopup": true, "expanded": false}
            ]}
        ]}]}"#;
        let (mut ctx, ids) = test_ctx(1280.0, json);
        ctx.menu.move_to_item(&mut ctx.doc, 0);
        assert!(ctx.menu.activate(&mut ctx.doc, 0));
        assert_eq!(
            ctx.menu.pending,
            Some(PendingFocus { position: 0, target: None })
        );

        ctx.menu.move_down(&mut ctx.doc, 0);
        assert_eq!(
            ctx.menu.pending,
            Some(PendingFocus { position: 0, target: Some(FocusHint::First) })
        );
        assert_eq!(ctx.doc.focused, Some(ids.id("trigger")));

        let popup = markup::attach_markup(
            &mut ctx,
            ids.id("item"),
            r#"{"kind": "popup", "children": [{"kind": "column", "children": [
                {"kind": "link", "id": "first"}, {"kind": "link"}
            ]}]}"#,
        )
        .unwrap();
        assert!(ctx.menu.pending.is_none());
        assert_eq!(ctx.doc.focused, Some(popup.id("first")));
    }

    #[test]
    fn test_pending_focus_dropped_when_collapsed_first() {
        let json = r#"{"kind": "header", "children": [{"kind": "main_nav", "children": [
            {"kind": "nav_item", "id": "item", "children": [
                {"kind": "nav_link", "id": "trigger", "haspopup": true, "expanded": false}
            ]}
        ]}]}"#;
        let (mut ctx, ids) = test_ctx(1280.0, json);
        ctx.menu.activate(&mut ctx.doc, 0);
        // Second activation before the subtree arrives.
        ctx.menu.activate(&mut ctx.doc, 0);
        assert!(!ctx.doc.is_expanded(ids.id("trigger")));

        markup::attach_markup(
            &mut ctx,
            ids.id("item"),
            r#"{"kind": "popup", "children": [{"kind": "link"}]}"#,
        )
        .unwrap();
        assert_eq!(ctx.menu.open, None);
        assert_eq!(expanded_popups(&ctx), 0);
    }

    #[test]
    fn test_focus_leaving_navigation_closes_popups() {
        let (mut ctx, ids) = test_ctx(1280.0, NAV);
        ctx.menu.activate(&mut ctx.doc, 1);
        ctx.menu.on_focus(&mut ctx.doc, ids.id("p11"), ids.id("products"));
        assert_eq!(expanded_popups(&ctx), 1);
        assert_eq!(ctx.menu.items[1].popup.as_ref().unwrap().columns[0].index, Some(0));

        ctx.menu.on_focus(&mut ctx.doc, ids.id("outside"), ids.id("p11"));
        assert_eq!(expanded_popups(&ctx), 0);
    }

    #[test]
    fn test_click_outside_closes() {
        let (mut ctx, ids) = test_ctx(1280.0, NAV);
        ctx.menu.activate(&mut ctx.doc, 1);
        assert!(!ctx.menu.on_click(&mut ctx.doc, ids.id("p12")));
        assert_eq!(expanded_popups(&ctx), 1);
        assert!(ctx.menu.on_click(&mut ctx.doc, ids.id("outside")));
        assert_eq!(expanded_popups(&ctx), 0);
    }

    #[test]
    fn test_breakpoint_crossing_resets() {
        let (mut ctx, _) = test_ctx(1280.0, NAV);
        ctx.menu.activate(&mut ctx.doc, 1);

        ctx.doc.backend.set_viewport(1250.0, 800.0);
        ctx.menu.on_resize(&mut ctx.doc);
        assert_eq!(expanded_popups(&ctx), 1);

        ctx.doc.backend.set_viewport(700.0, 800.0);
        ctx.menu.on_resize(&mut ctx.doc);
        assert_eq!(expanded_popups(&ctx), 0);
        assert!(!ctx.menu.popup_flag);
        assert_eq!(ctx.menu.items.len(), 5);
    }

    #[test]
    fn test_reset_rediscovers() {
        let (mut ctx, _) = test_ctx(1280.0, NAV);
        ctx.menu.popup_flag = true;
        ctx.menu.destroy();
        assert!(!ctx.menu.has_items());
        assert!(!ctx.menu.popup_flag);
        ctx.menu.reset(&mut ctx.doc);
        assert_eq!(ctx.menu.items.len(), 5);
    }
}
