//! Popup Controller — one trigger's dropdown.
//!
//! Responsibilities:
//! - Expand a popup (highlight, curtain, open class, ARIA and analytics state, position)
//! - Close every popup in the document and everything hanging off it
//! - Focus placement on entry (first/last item) and moves across columns
//!
//! Moves that leave the popup are reported as `PopupMove` exits; the menu
//! decides which top-level item receives focus.

use tracing::{debug, trace};

use crate::context::Document;
use crate::layout;
use crate::model::{self, Column, ColumnMove};
use crate::tree;
use crate::types::{AnalyticsState, FocusHint, NodeClasses, NodeKind};

/// Curtain requestor used by popups.
pub const POPUP_REQUESTOR: &str = "popup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PopupPhase {
    #[default]
    Closed,
    /// Trigger activated, subtree not inserted yet.
    Expanding,
    Expanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PopupMove {
    Moved,
    Stay,
    ExitToTrigger,
    ExitToNextItem,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Popup {
    pub node: u32,
    pub trigger: u32,
    pub columns: Vec<Column>,
    pub index: Option<usize>,
}

// ============================================================================
// Curtain
// ============================================================================

fn curtain(doc: &Document) -> Option<u32> {
    doc.nodes
        .iter()
        .filter(|(_, n)| n.kind == NodeKind::Curtain)
        .map(|(&h, _)| h)
        .min()
}

/// Open the page-dimming curtain and record who asked for it.
pub(crate) fn open_curtain(doc: &mut Document, requestor: &str) {
    let Some(handle) = curtain(doc) else {
        return;
    };
    doc.add_class(handle, NodeClasses::CURTAIN_OPEN);
    if !requestor.is_empty() {
        if let Some(node) = doc.nodes.get_mut(&handle) {
            node.requestor = Some(requestor.to_string());
        }
    }
    trace!(requestor, "open_curtain");
}

/// Close the curtain. With a requestor, only a curtain opened by that
/// requestor is closed; without one, it always closes.
pub(crate) fn close_curtain(doc: &mut Document, requestor: Option<&str>) {
    let Some(handle) = curtain(doc) else {
        return;
    };
    if !doc.has_class(handle, NodeClasses::CURTAIN_OPEN) {
        return;
    }
    let owner = doc.nodes.get(&handle).and_then(|n| n.requestor.clone());
    let allowed = match requestor {
        None => true,
        Some(r) => !r.is_empty() && owner.as_deref() == Some(r),
    };
    if allowed {
        doc.remove_class(handle, NodeClasses::CURTAIN_OPEN);
        if let Some(node) = doc.nodes.get_mut(&handle) {
            node.requestor = None;
        }
        trace!(?requestor, "close_curtain");
    }
}

// ============================================================================
// Document-wide close
// ============================================================================

/// The trigger a popup belongs to: the top-level link in the same container.
pub(crate) fn trigger_of(doc: &Document, popup: u32) -> Option<u32> {
    let container = tree::closest_above(doc, popup, NodeKind::NavItem)?;
    tree::child_of_kind(doc, container, NodeKind::NavLink)
}

/// Collapse every open popup, its trigger state and all expanded headlines.
/// With `highlight_parent`, an active section's highlight moves to its
/// top-level item container.
pub(crate) fn close_all(doc: &mut Document, highlight_parent: bool) {
    model::deactivate_dropdowns(doc, highlight_parent);
    close_curtain(doc, Some(POPUP_REQUESTOR));

    let mut open = doc.nodes_with_class(NodeClasses::OPEN_POPUP);
    open.sort_unstable();
    if open.is_empty() {
        return;
    }
    for popup in &open {
        doc.remove_class(*popup, NodeClasses::OPEN_POPUP);
        doc.set_offset_left(*popup, None);
        if let Some(trigger) = trigger_of(doc, *popup) {
            collapse_trigger(doc, trigger);
        }
    }
    model::collapse_headlines(doc);
    debug!(closed = open.len(), highlight_parent, "popup close_all");
}

/// Trigger projection of a closed popup.
pub(crate) fn collapse_trigger(doc: &mut Document, trigger: u32) {
    doc.set_expanded(trigger, false);
    if doc.nodes.get(&trigger).and_then(|n| n.analytics) == Some(AnalyticsState::Close) {
        doc.set_analytics(trigger, AnalyticsState::Open);
    }
}

/// Trigger projection of an open popup.
pub(crate) fn expand_trigger(doc: &mut Document, trigger: u32) {
    doc.set_expanded(trigger, true);
    if doc.nodes.get(&trigger).and_then(|n| n.analytics) == Some(AnalyticsState::Open) {
        doc.set_analytics(trigger, AnalyticsState::Close);
    }
}

// ============================================================================
// Popup
// ============================================================================

impl Popup {
    /// Find the popup a trigger owns, if its subtree is in the tree.
    pub fn discover(doc: &Document, trigger: u32) -> Option<Self> {
        let container = doc
            .nodes
            .get(&trigger)?
            .parent
            .filter(|&p| doc.kind(p) == Some(NodeKind::NavItem))?;
        let node = tree::child_of_kind(doc, container, NodeKind::Popup)?;
        Some(Self {
            node,
            trigger,
            columns: Vec::new(),
            index: None,
        })
    }

    pub fn has_items(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn is_expanded(&self, doc: &Document) -> bool {
        doc.has_class(self.node, NodeClasses::OPEN_POPUP)
    }

    /// Open this popup. Callers close other popups first.
    pub fn expand(&mut self, doc: &mut Document) {
        let container = tree::closest_above(doc, self.node, NodeKind::NavItem);
        if let Some(container) = container {
            doc.add_class(container, NodeClasses::ACTIVE_DROPDOWN);
            if doc.has_class(container, NodeClasses::FULL_WIDTH) && doc.is_desktop() {
                open_curtain(doc, POPUP_REQUESTOR);
            }
        }

        doc.add_class(self.node, NodeClasses::OPEN_POPUP);
        expand_trigger(doc, self.trigger);
        self.adjust_position(doc);

        self.columns = model::build_columns(doc, self.node);
        self.index = None;
        debug!(
            popup = self.node,
            trigger = self.trigger,
            columns = self.columns.len(),
            "popup expand"
        );
    }

    /// Keep a popup narrower than the viewport fully on screen.
    pub fn adjust_position(&self, doc: &mut Document) {
        let Ok(rect) = layout::absolute_box(doc, self.node) else {
            return;
        };
        let viewport = doc.viewport_width();
        if rect.width.ceil() >= viewport {
            return;
        }
        if rect.x < 0.0 {
            doc.set_offset_left(self.node, Some(rect.x.abs()));
        } else if rect.right().ceil() > viewport {
            doc.set_offset_left(self.node, Some(viewport - rect.right()));
        }
    }

    /// Place focus on entry.
    pub fn focus(&mut self, doc: &mut Document, hint: FocusHint) -> PopupMove {
        match hint {
            FocusHint::First => self.move_to_first_item(doc),
            FocusHint::Last => self.move_to_last_item(doc),
        }
    }

    pub fn move_to_first_item(&mut self, doc: &mut Document) -> PopupMove {
        if !self.has_items() {
            return PopupMove::Stay;
        }
        self.index = Some(0);
        let outcome = self.columns[0].move_to_first_element(doc);
        self.resolve_forward(doc, 0, outcome, false)
    }

    pub fn move_to_last_item(&mut self, doc: &mut Document) -> PopupMove {
        if !self.has_items() {
            return PopupMove::Stay;
        }
        let last = self.columns.len() - 1;
        self.index = Some(last);
        let outcome = self.columns[last].move_to_last_element(doc);
        self.resolve_backward(doc, last, outcome)
    }

    /// Column and item position of a popup link.
    pub fn locate(&self, item: u32) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(c, col)| col.position_of(item).map(|p| (c, p)))
    }

    /// Column and section of a headline.
    pub fn locate_headline(&self, headline: u32) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(c, col)| col.section_with_headline(headline).map(|s| (c, s)))
    }

    /// Record host focus on a popup link.
    pub fn set_index(&mut self, column: usize, position: Option<usize>) {
        if let Some(col) = self.columns.get_mut(column) {
            col.index = position;
            self.index = Some(column);
        }
    }

    // ------------------------------------------------------------------------
    // Vertical
    // ------------------------------------------------------------------------

    /// Down, continuing into the next column past the end of this one.
    pub fn move_down(&mut self, doc: &mut Document, column: usize, position: usize) -> PopupMove {
        let Some(col) = self.columns.get_mut(column) else {
            return PopupMove::Stay;
        };
        let outcome = col.move_to_next_item(doc, position);
        self.resolve_forward(doc, column, outcome, true)
    }

    /// Up, continuing into the previous column's last item, or the trigger.
    pub fn move_up(&mut self, doc: &mut Document, column: usize, position: usize) -> PopupMove {
        let Some(col) = self.columns.get_mut(column) else {
            return PopupMove::Stay;
        };
        let outcome = col.move_to_previous_element(doc, position);
        self.resolve_backward(doc, column, outcome)
    }

    /// Up without stopping on a headline.
    pub fn move_up_from_headline(
        &mut self,
        doc: &mut Document,
        column: usize,
        section: usize,
    ) -> PopupMove {
        let Some(col) = self.columns.get_mut(column) else {
            return PopupMove::Stay;
        };
        let Some(start) = col.sections.get(section).map(|s| s.start) else {
            return PopupMove::Stay;
        };
        let outcome = col.move_to_previous_item(doc, start);
        self.resolve_backward(doc, column, outcome)
    }

    /// Down from a headline into its own section.
    pub fn move_down_from_headline(
        &mut self,
        doc: &mut Document,
        column: usize,
        section: usize,
    ) -> PopupMove {
        let Some(col) = self.columns.get_mut(column) else {
            return PopupMove::Stay;
        };
        let outcome = col.enter_section(doc, section);
        self.resolve_forward(doc, column, outcome, true)
    }

    fn resolve_forward(
        &mut self,
        doc: &mut Document,
        column: usize,
        outcome: ColumnMove,
        to_next_item: bool,
    ) -> PopupMove {
        let mut column = column;
        let mut outcome = outcome;
        loop {
            match outcome {
                ColumnMove::Focused => {
                    self.index = Some(column);
                    return PopupMove::Moved;
                }
                ColumnMove::Stay => return PopupMove::Stay,
                ColumnMove::ExitBefore => {
                    self.index = None;
                    return PopupMove::ExitToTrigger;
                }
                ColumnMove::ExitAfter => {
                    column += 1;
                    if column >= self.columns.len() {
                        self.index = None;
                        return if to_next_item {
                            PopupMove::ExitToNextItem
                        } else {
                            PopupMove::ExitToTrigger
                        };
                    }
                    outcome = self.columns[column].move_to_first_element(doc);
                }
            }
        }
    }

    fn resolve_backward(&mut self, doc: &mut Document, column: usize, outcome: ColumnMove) -> PopupMove {
        let mut column = column;
        let mut outcome = outcome;
        loop {
            match outcome {
                ColumnMove::Focused => {
                    self.index = Some(column);
                    return PopupMove::Moved;
                }
                ColumnMove::Stay => return PopupMove::Stay,
                ColumnMove::ExitAfter => {
                    self.index = None;
                    return PopupMove::ExitToNextItem;
                }
                ColumnMove::ExitBefore => {
                    let Some(previous) = column.checked_sub(1) else {
                        self.index = None;
                        return PopupMove::ExitToTrigger;
                    };
                    column = previous;
                    model::close_all_headlines(doc, true);
                    outcome = self.columns[column].move_to_last_element(doc);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Lateral
    // ------------------------------------------------------------------------

    /// Lateral stops: whole columns on desktop, sections below the breakpoint.
    fn lateral_stops(&self, desktop: bool) -> Vec<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(c, col)| {
                let sections = if desktop { 1 } else { col.sections.len().max(1) };
                (0..sections).map(move |s| (c, s))
            })
            .collect()
    }

    fn current_stop(&self, desktop: bool, column: usize, position: usize) -> (usize, usize) {
        if desktop {
            (column, 0)
        } else {
            let section = self
                .columns
                .get(column)
                .and_then(|c| c.section_of(position))
                .unwrap_or(0);
            (column, section)
        }
    }

    fn enter_stop(&mut self, doc: &mut Document, stop: (usize, usize), desktop: bool) -> PopupMove {
        let (column, section) = stop;
        let outcome = if desktop {
            self.columns[column].move_to_first_element(doc)
        } else {
            self.columns[column].enter_section(doc, section)
        };
        self.resolve_forward(doc, column, outcome, true)
    }

    /// Logical right: first item of the next column (or section).
    pub fn move_right(&mut self, doc: &mut Document, column: usize, position: usize) -> PopupMove {
        if !self.has_items() {
            return PopupMove::Stay;
        }
        let desktop = doc.is_desktop();
        let stops = self.lateral_stops(desktop);
        let current = self.current_stop(desktop, column, position);
        match stops.iter().position(|&s| s == current) {
            Some(i) if i + 1 < stops.len() => self.enter_stop(doc, stops[i + 1], desktop),
            _ => {
                self.index = None;
                PopupMove::ExitToNextItem
            }
        }
    }

    /// Logical left: first item of the previous column (or section).
    pub fn move_left(&mut self, doc: &mut Document, column: usize, position: usize) -> PopupMove {
        if !self.has_items() {
            return PopupMove::Stay;
        }
        let desktop = doc.is_desktop();
        let stops = self.lateral_stops(desktop);
        let current = self.current_stop(desktop, column, position);
        match stops.iter().position(|&s| s == current) {
            Some(i) if i > 0 => {
                model::close_all_headlines(doc, true);
                self.enter_stop(doc, stops[i - 1], desktop)
            }
            _ => {
                self.index = None;
                PopupMove::ExitToTrigger
            }
        }
    }
}
