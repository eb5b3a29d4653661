//! Column/Section Model — popup contents as index-addressable records.
//!
//! Responsibilities:
//! - Partition a popup's links into columns (document order, nested lists deduplicated)
//! - Partition each column into sections; blank headlines are removed from the tree
//! - Column-local roving: vertical moves, visible-item search, headline expansion
//! - Document-wide headline collapse and active-dropdown highlight bookkeeping
//!
//! Columns are rebuilt from the tree each time their popup expands, so
//! traversal is index arithmetic over these records rather than repeated
//! tree queries.

use tracing::{debug, trace};

use crate::context::Document;
use crate::tree;
use crate::types::{Direction, NavEvent, NodeClasses, NodeKind};
use crate::visibility;

// ============================================================================
// Records
// ============================================================================

/// A run of column items sharing one (optional) collapsible headline.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Section {
    /// Section node, `None` for items outside any section.
    pub node: Option<u32>,
    pub headline: Option<u32>,
    /// Item range `start..end` within the column.
    pub start: usize,
    pub end: usize,
}

impl Section {
    pub fn contains(&self, position: usize) -> bool {
        (self.start..self.end).contains(&position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Column {
    pub node: u32,
    pub position: usize,
    pub items: Vec<u32>,
    pub sections: Vec<Section>,
    pub index: Option<usize>,
}

/// Outcome of a column-local move. Exits are resolved by the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnMove {
    Focused,
    /// Nothing to move over; index untouched.
    Stay,
    ExitBefore,
    ExitAfter,
}

// ============================================================================
// Construction
// ============================================================================

/// Build the columns of a popup subtree.
pub(crate) fn build_columns(doc: &mut Document, popup: u32) -> Vec<Column> {
    let links = tree::find_all_of_kind(doc, popup, NodeKind::Link);

    let mut accepted: Vec<u32> = Vec::new();
    for link in links {
        let column = tree::closest(doc, link, NodeKind::Column)
            .filter(|&c| tree::is_descendant_of(doc, c, popup))
            .unwrap_or(popup);
        if accepted.contains(&column) {
            continue;
        }
        // A list nested inside an accepted column is part of that column.
        if accepted
            .iter()
            .any(|&a| tree::is_descendant_of(doc, column, a))
        {
            continue;
        }
        accepted.push(column);
    }

    let columns: Vec<Column> = accepted
        .into_iter()
        .enumerate()
        .map(|(position, node)| build_column(doc, node, position))
        .collect();
    debug!(popup, columns = columns.len(), "build_columns");
    columns
}

fn build_column(doc: &mut Document, node: u32, position: usize) -> Column {
    remove_blank_headlines(doc, node);

    let items = tree::find_all_of_kind(doc, node, NodeKind::Link);
    let mut sections: Vec<Section> = Vec::new();
    for (i, &item) in items.iter().enumerate() {
        let section_node = tree::closest(doc, item, NodeKind::Section)
            .filter(|&s| tree::is_descendant_of(doc, s, node));
        match sections.last_mut() {
            Some(last) if last.node == section_node => last.end = i + 1,
            _ => sections.push(Section {
                node: section_node,
                headline: section_node.and_then(|s| crate::style::section_headline(doc, s)),
                start: i,
                end: i + 1,
            }),
        }
    }

    Column {
        node,
        position,
        items,
        sections,
        index: None,
    }
}

/// Headlines without text are removed rather than rendered.
fn remove_blank_headlines(doc: &mut Document, column: u32) {
    let blank: Vec<u32> = tree::find_all_of_kind(doc, column, NodeKind::Headline)
        .into_iter()
        .filter(|&h| tree::text_content(doc, h).trim().is_empty())
        .collect();
    for headline in blank {
        if tree::destroy_node(doc, headline).is_ok() {
            trace!(headline, "removed blank headline");
            doc.event_buffer.push(NavEvent::removed(headline));
        }
    }
}

// ============================================================================
// Document-wide state
// ============================================================================

/// Remove every active-dropdown highlight. With `highlight_parent`, the
/// highlight moves to the enclosing top-level item container instead.
pub(crate) fn deactivate_dropdowns(doc: &mut Document, highlight_parent: bool) {
    let mut active = doc.nodes_with_class(NodeClasses::ACTIVE_DROPDOWN);
    active.sort_unstable();
    for node in active {
        doc.remove_class(node, NodeClasses::ACTIVE_DROPDOWN);
        if highlight_parent {
            if let Some(container) = tree::closest_above(doc, node, NodeKind::NavItem) {
                doc.add_class(container, NodeClasses::ACTIVE_DROPDOWN);
            }
        }
    }
}

/// Collapse every expanded headline in the document.
pub(crate) fn close_all_headlines(doc: &mut Document, highlight_parent: bool) {
    deactivate_dropdowns(doc, highlight_parent);
    collapse_headlines(doc);
}

/// Headline ARIA state only; highlights are left alone.
pub(crate) fn collapse_headlines(doc: &mut Document) {
    let mut expanded: Vec<u32> = doc
        .nodes
        .iter()
        .filter(|(_, n)| n.kind == NodeKind::Headline && n.is_expanded())
        .map(|(&h, _)| h)
        .collect();
    expanded.sort_unstable();
    for headline in expanded {
        doc.set_expanded(headline, false);
    }
}

// ============================================================================
// Column operations
// ============================================================================

impl Column {
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn section_of(&self, position: usize) -> Option<usize> {
        self.sections.iter().position(|s| s.contains(position))
    }

    pub fn position_of(&self, item: u32) -> Option<usize> {
        self.items.iter().position(|&i| i == item)
    }

    pub fn section_with_headline(&self, headline: u32) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.headline == Some(headline))
    }

    /// Below the breakpoint with a visible headline, a section must be
    /// expanded before its items can take focus.
    pub fn is_section_expandable(&self, doc: &mut Document, section: usize) -> bool {
        if doc.is_desktop() {
            return false;
        }
        match self.sections.get(section).and_then(|s| s.headline) {
            Some(headline) => visibility::is_visible(doc, headline),
            None => false,
        }
    }

    pub fn is_section_expanded(&self, doc: &Document, section: usize) -> bool {
        self.sections
            .get(section)
            .and_then(|s| s.headline)
            .is_some_and(|h| doc.is_expanded(h))
    }

    /// Expand one section's headline, collapsing all others. Focus is left
    /// to the caller.
    pub fn expand_section(&self, doc: &mut Document, section: usize) {
        let Some(s) = self.sections.get(section) else {
            return;
        };
        let Some(headline) = s.headline else {
            return;
        };
        close_all_headlines(doc, false);
        doc.add_class(s.node.unwrap_or(self.node), NodeClasses::ACTIVE_DROPDOWN);
        doc.set_expanded(headline, true);
        debug!(column = self.position, section, headline, "expand_section");
    }

    fn expand_if_collapsed(&self, doc: &mut Document, section: usize) {
        if self.is_section_expandable(doc, section) && !self.is_section_expanded(doc, section) {
            self.expand_section(doc, section);
        }
    }

    /// Focus is crossing from `from` into `to`. Below the breakpoint the
    /// section being left collapses before the target one opens.
    fn cross_sections(&self, doc: &mut Document, from: usize, to: usize) {
        let Some(section) = self.section_of(to) else {
            return;
        };
        let left = self.section_of(from);
        if left == Some(section) {
            return;
        }
        if !doc.is_desktop() && left.is_some_and(|l| self.is_section_expanded(doc, l)) {
            close_all_headlines(doc, true);
        }
        self.expand_if_collapsed(doc, section);
    }

    /// Focus `position`, or the nearest visible item in `direction`.
    pub fn move_to_item(
        &mut self,
        doc: &mut Document,
        position: isize,
        direction: Direction,
    ) -> ColumnMove {
        if !self.has_items() {
            return ColumnMove::Stay;
        }
        let mut current = position;
        loop {
            if current < 0 {
                self.index = None;
                return ColumnMove::ExitBefore;
            }
            let Some(&item) = self.items.get(current as usize) else {
                self.index = None;
                return ColumnMove::ExitAfter;
            };
            if visibility::is_visible(doc, item) {
                self.index = Some(current as usize);
                doc.focus(item);
                return ColumnMove::Focused;
            }
            current += match direction {
                Direction::Ascending => 1,
                Direction::Descending => -1,
            };
        }
    }

    /// Down from `position`. Entering a collapsed section expands it first.
    pub fn move_to_next_item(&mut self, doc: &mut Document, position: usize) -> ColumnMove {
        if !self.has_items() {
            return ColumnMove::Stay;
        }
        let next = position + 1;
        if next >= self.items.len() {
            self.index = None;
            return ColumnMove::ExitAfter;
        }
        self.cross_sections(doc, position, next);
        self.move_to_item(doc, next as isize, Direction::Ascending)
    }

    /// Up from `position`, crossing into the previous section without
    /// stopping on its headline.
    pub fn move_to_previous_item(&mut self, doc: &mut Document, position: usize) -> ColumnMove {
        if !self.has_items() {
            return ColumnMove::Stay;
        }
        let Some(previous) = position.checked_sub(1) else {
            self.index = None;
            return ColumnMove::ExitBefore;
        };
        self.cross_sections(doc, position, previous);
        self.move_to_item(doc, previous as isize, Direction::Descending)
    }

    /// Up from `position`. At the top of an expandable section the
    /// headline takes focus.
    pub fn move_to_previous_element(&mut self, doc: &mut Document, position: usize) -> ColumnMove {
        if let Some(section) = self.section_of(position) {
            let s = &self.sections[section];
            if s.start == position && self.is_section_expandable(doc, section) {
                if let Some(headline) = s.headline {
                    doc.focus(headline);
                    self.index = None;
                    return ColumnMove::Focused;
                }
            }
        }
        self.move_to_previous_item(doc, position)
    }

    /// Focus the first item, expanding the first section when required.
    pub fn move_to_first_element(&mut self, doc: &mut Document) -> ColumnMove {
        self.expand_if_collapsed(doc, 0);
        self.move_to_item(doc, 0, Direction::Ascending)
    }

    /// Focus the last item, expanding the last section when required.
    pub fn move_to_last_element(&mut self, doc: &mut Document) -> ColumnMove {
        if !self.has_items() {
            return ColumnMove::Stay;
        }
        self.expand_if_collapsed(doc, self.sections.len() - 1);
        self.move_to_item(doc, self.items.len() as isize - 1, Direction::Descending)
    }

    /// Focus the first item of `section`, expanding it when required.
    pub fn enter_section(&mut self, doc: &mut Document, section: usize) -> ColumnMove {
        let Some(start) = self.sections.get(section).map(|s| s.start) else {
            return ColumnMove::Stay;
        };
        self.expand_if_collapsed(doc, section);
        self.move_to_item(doc, start as isize, Direction::Ascending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockBackend;

    fn test_doc(width: f32) -> (Document, u32) {
        let mut doc = Document::new(Box::new(MockBackend::new(width, 800.0)));
        let root = tree::create_node(&mut doc, NodeKind::Header).unwrap();
        let popup = tree::create_node(&mut doc, NodeKind::Popup).unwrap();
        tree::append_child(&mut doc, root, popup).unwrap();
        doc.root = Some(root);
        doc.add_class(popup, NodeClasses::OPEN_POPUP);
        doc.event_buffer.clear();
        (doc, popup)
    }

    fn add(doc: &mut Document, parent: u32, kind: NodeKind) -> u32 {
        let h = tree::create_node(doc, kind).unwrap();
        tree::append_child(doc, parent, h).unwrap();
        h
    }

    fn add_headline(doc: &mut Document, section: u32, text: &str) -> u32 {
        let h = add(doc, section, NodeKind::Headline);
        doc.nodes.get_mut(&h).unwrap().text = text.into();
        h
    }

    #[test]
    fn test_columns_in_document_order() {
        let (mut doc, popup) = test_doc(1280.0);
        let c1 = add(&mut doc, popup, NodeKind::Column);
        let c2 = add(&mut doc, popup, NodeKind::Column);
        let a = add(&mut doc, c1, NodeKind::Link);
        let b = add(&mut doc, c2, NodeKind::Link);
        let c = add(&mut doc, c2, NodeKind::Link);

        let columns = build_columns(&mut doc, popup);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].items, vec![a]);
        assert_eq!(columns[1].items, vec![b, c]);
        assert_eq!(columns[1].position, 1);
    }

    #[test]
    fn test_nested_list_is_not_double_counted() {
        let (mut doc, popup) = test_doc(1280.0);
        let outer = add(&mut doc, popup, NodeKind::Column);
        let a = add(&mut doc, outer, NodeKind::Link);
        let inner = add(&mut doc, outer, NodeKind::Column);
        let b = add(&mut doc, inner, NodeKind::Link);

        let columns = build_columns(&mut doc, popup);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].items, vec![a, b]);
    }

    #[test]
    fn test_links_outside_columns_form_one_column() {
        let (mut doc, popup) = test_doc(1280.0);
        let a = add(&mut doc, popup, NodeKind::Link);
        let columns = build_columns(&mut doc, popup);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].node, popup);
        assert_eq!(columns[0].items, vec![a]);
    }

    #[test]
    fn test_sections_and_blank_headline_removal() {
        let (mut doc, popup) = test_doc(600.0);
        let col = add(&mut doc, popup, NodeKind::Column);
        let s1 = add(&mut doc, col, NodeKind::Section);
        let blank = add_headline(&mut doc, s1, "  ");
        add(&mut doc, s1, NodeKind::Link);
        let s2 = add(&mut doc, col, NodeKind::Section);
        let headline = add_headline(&mut doc, s2, "Apps");
        add(&mut doc, s2, NodeKind::Link);
        add(&mut doc, s2, NodeKind::Link);

        let columns = build_columns(&mut doc, popup);
        let column = &columns[0];
        assert!(!doc.nodes.contains_key(&blank));
        assert!(doc.event_buffer.contains(&NavEvent::removed(blank)));
        assert_eq!(column.sections.len(), 2);
        assert_eq!(column.sections[0].headline, None);
        assert_eq!(column.sections[1].headline, Some(headline));
        assert_eq!((column.sections[1].start, column.sections[1].end), (1, 3));
        assert_eq!(column.section_of(2), Some(1));
    }

    #[test]
    fn test_empty_column_moves_are_noops() {
        let (mut doc, _) = test_doc(1280.0);
        let mut column = Column {
            node: 1,
            position: 0,
            items: Vec::new(),
            sections: Vec::new(),
            index: None,
        };
        assert_eq!(column.move_to_item(&mut doc, 0, Direction::Ascending), ColumnMove::Stay);
        assert_eq!(column.move_to_next_item(&mut doc, 0), ColumnMove::Stay);
        assert_eq!(column.move_to_previous_item(&mut doc, 0), ColumnMove::Stay);
        assert_eq!(column.move_to_first_element(&mut doc), ColumnMove::Stay);
        assert_eq!(column.move_to_last_element(&mut doc), ColumnMove::Stay);
        assert_eq!(column.enter_section(&mut doc, 0), ColumnMove::Stay);
        assert_eq!(column.index, None);
        assert_eq!(doc.focused, None);
    }

    #[test]
    fn test_move_to_item_skips_hidden_in_direction() {
        let (mut doc, popup) = test_doc(1280.0);
        let col = add(&mut doc, popup, NodeKind::Column);
        let a = add(&mut doc, col, NodeKind::Link);
        let b = add(&mut doc, col, NodeKind::Link);
        let c = add(&mut doc, col, NodeKind::Link);
        doc.nodes.get_mut(&b).unwrap().display_none = true;

        let mut column = build_columns(&mut doc, popup).remove(0);
        assert_eq!(column.move_to_item(&mut doc, 1, Direction::Ascending), ColumnMove::Focused);
        assert_eq!((doc.focused, column.index), (Some(c), Some(2)));

        assert_eq!(column.move_to_item(&mut doc, 1, Direction::Descending), ColumnMove::Focused);
        assert_eq!((doc.focused, column.index), (Some(a), Some(0)));

        assert_eq!(column.move_to_next_item(&mut doc, 2), ColumnMove::ExitAfter);
        assert_eq!(column.index, None);
        assert_eq!(column.move_to_item(&mut doc, -1, Direction::Descending), ColumnMove::ExitBefore);
    }

    #[test]
    fn test_down_into_collapsed_section_expands_it() {
        let (mut doc, popup) = test_doc(600.0);
        let col = add(&mut doc, popup, NodeKind::Column);
        let s1 = add(&mut doc, col, NodeKind::Section);
        add(&mut doc, s1, NodeKind::Link);
        let last_of_first = add(&mut doc, s1, NodeKind::Link);
        let s2 = add(&mut doc, col, NodeKind::Section);
        let headline = add_headline(&mut doc, s2, "More");
        let first_of_second = add(&mut doc, s2, NodeKind::Link);

        let mut column = build_columns(&mut doc, popup).remove(0);
        doc.focus(last_of_first);
        assert!(!visibility::is_visible(&mut doc, first_of_second));

        assert_eq!(column.move_to_next_item(&mut doc, 1), ColumnMove::Focused);
        assert!(doc.is_expanded(headline));
        assert!(doc.has_class(s2, NodeClasses::ACTIVE_DROPDOWN));
        assert_eq!(doc.focused, Some(first_of_second));

        // Back up: the headline of the expanded section takes focus first.
        assert_eq!(column.move_to_previous_element(&mut doc, 2), ColumnMove::Focused);
        assert_eq!(doc.focused, Some(headline));

        // Leaving the section upward collapses it.
        assert_eq!(column.move_to_previous_item(&mut doc, 2), ColumnMove::Focused);
        assert_eq!(doc.focused, Some(last_of_first));
        assert!(!doc.is_expanded(headline));
        assert!(!doc.has_class(s2, NodeClasses::ACTIVE_DROPDOWN));
    }

    #[test]
    fn test_desktop_sections_are_not_expandable() {
        let (mut doc, popup) = test_doc(1280.0);
        let col = add(&mut doc, popup, NodeKind::Column);
        let s1 = add(&mut doc, col, NodeKind::Section);
        let headline = add_headline(&mut doc, s1, "Tools");
        add(&mut doc, s1, NodeKind::Link);

        let mut column = build_columns(&mut doc, popup).remove(0);
        assert!(!column.is_section_expandable(&mut doc, 0));
        assert_eq!(column.move_to_first_element(&mut doc), ColumnMove::Focused);
        assert!(!doc.is_expanded(headline));
    }

    #[test]
    fn test_close_all_headlines_moves_highlight_up() {
        let (mut doc, popup) = test_doc(600.0);
        let root = doc.root.unwrap();
        let item = add(&mut doc, root, NodeKind::NavItem);
        tree::append_child(&mut doc, item, popup).unwrap();
        let col = add(&mut doc, popup, NodeKind::Column);
        let section = add(&mut doc, col, NodeKind::Section);
        let headline = add_headline(&mut doc, section, "Learn");
        add(&mut doc, section, NodeKind::Link);

        let column = build_columns(&mut doc, popup).remove(0);
        column.expand_section(&mut doc, 0);
        assert!(doc.has_class(section, NodeClasses::ACTIVE_DROPDOWN));

        close_all_headlines(&mut doc, true);
        assert!(!doc.is_expanded(headline));
        assert!(!doc.has_class(section, NodeClasses::ACTIVE_DROPDOWN));
        assert!(doc.has_class(item, NodeClasses::ACTIVE_DROPDOWN));
    }
}
