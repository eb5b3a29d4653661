//! Tree Module — Mirrored node tree CRUD and queries.
//!
//! Responsibilities:
//! - Handle allocation (sequential u32, never recycled)
//! - Node creation/destruction
//! - Parent-child relationships
//! - Dirty-flag propagation to ancestors
//! - Ancestry and document-order queries used in place of selector lookups

use crate::context::Document;
use crate::error::{NavError, Result};
use crate::types::{NavNode, NodeKind};
use taffy::prelude::*;
use taffy::style_helpers::{length, percent};

/// Size given to focusable leaves until the host reports a real one.
pub const DEFAULT_LEAF_SIZE: (f32, f32) = (80.0, 24.0);

fn default_style(kind: NodeKind) -> Style {
    let mut s = Style::DEFAULT;
    // Nothing may shrink below its measured box; a zero box reads as hidden.
    s.flex_shrink = 0.0;
    match kind {
        NodeKind::Popup => {
            s.position = Position::Absolute;
            s.flex_direction = FlexDirection::Row;
        }
        NodeKind::Column | NodeKind::Section => {
            s.flex_direction = FlexDirection::Column;
        }
        NodeKind::Curtain => {
            s.position = Position::Absolute;
            s.size = Size {
                width: percent(1.0),
                height: percent(1.0),
            };
        }
        k if k.is_focusable() => {
            s.size = Size {
                width: length(DEFAULT_LEAF_SIZE.0),
                height: length(DEFAULT_LEAF_SIZE.1),
            };
        }
        _ => {}
    }
    s
}

/// Allocate a new handle and create a node in the tree.
pub(crate) fn create_node(doc: &mut Document, kind: NodeKind) -> Result<u32> {
    let handle = doc.next_handle;
    doc.next_handle += 1;

    let style = default_style(kind);
    let taffy_node = if kind.is_focusable() {
        doc.tree.new_leaf(style)?
    } else {
        doc.tree.new_with_children(style, &[])?
    };

    doc.nodes.insert(handle, NavNode::new(kind, taffy_node));
    tracing::trace!(?kind, handle, "create_node");

    Ok(handle)
}

/// Destroy a node. Detaches from parent. Orphans children (does not cascade).
pub(crate) fn destroy_node(doc: &mut Document, handle: u32) -> Result<()> {
    let node = doc
        .nodes
        .remove(&handle)
        .ok_or(NavError::InvalidHandle(handle))?;

    if let Some(parent_handle) = node.parent {
        if let Some(parent) = doc.nodes.get_mut(&parent_handle) {
            parent.children.retain(|&h| h != handle);
            mark_dirty_ancestors(doc, parent_handle);
        }
    }

    for &child_handle in &node.children {
        if let Some(child) = doc.nodes.get_mut(&child_handle) {
            child.parent = None;
        }
    }

    let _ = doc.tree.remove(node.taffy_node);

    if doc.root == Some(handle) {
        doc.root = None;
    }
    if doc.focused == Some(handle) {
        doc.focused = None;
    }

    tracing::trace!(handle, "destroy_node");
    Ok(())
}

/// Append a child to a parent node.
pub(crate) fn append_child(doc: &mut Document, parent: u32, child: u32) -> Result<()> {
    let parent_taffy = doc
        .nodes
        .get(&parent)
        .ok_or(NavError::InvalidHandle(parent))?
        .taffy_node;

    let child_node = doc
        .nodes
        .get(&child)
        .ok_or(NavError::InvalidHandle(child))?;
    let child_taffy = child_node.taffy_node;
    let old_parent = child_node.parent;

    if is_descendant_of(doc, parent, child) {
        return Err(NavError::Cycle { parent, child });
    }

    // Detach from previous parent if any
    if let Some(old_parent) = old_parent {
        if old_parent != parent {
            if let Some(old_p) = doc.nodes.get_mut(&old_parent) {
                old_p.children.retain(|&h| h != child);
                let old_taffy = old_p.taffy_node;
                let _ = doc.tree.remove_child(old_taffy, child_taffy);
            }
            mark_dirty_ancestors(doc, old_parent);
        }
    }

    let already_child = doc
        .nodes
        .get(&parent)
        .is_some_and(|p| p.children.contains(&child));
    if !already_child {
        doc.tree.add_child(parent_taffy, child_taffy)?;
        if let Some(p) = doc.nodes.get_mut(&parent) {
            p.children.push(child);
        }
    }
    if let Some(c) = doc.nodes.get_mut(&child) {
        c.parent = Some(parent);
    }

    mark_dirty(doc, child);
    tracing::trace!(parent, child, "append_child");
    Ok(())
}

/// Remove a child from a parent node.
pub(crate) fn remove_child(doc: &mut Document, parent: u32, child: u32) -> Result<()> {
    let parent_taffy = doc
        .nodes
        .get(&parent)
        .ok_or(NavError::InvalidHandle(parent))?
        .taffy_node;

    let child_taffy = doc
        .nodes
        .get(&child)
        .ok_or(NavError::InvalidHandle(child))?
        .taffy_node;

    doc.tree.remove_child(parent_taffy, child_taffy)?;

    if let Some(p) = doc.nodes.get_mut(&parent) {
        p.children.retain(|&h| h != child);
    }
    if let Some(c) = doc.nodes.get_mut(&child) {
        c.parent = None;
    }

    mark_dirty_ancestors(doc, parent);
    tracing::trace!(parent, child, "remove_child");
    Ok(())
}

/// Mark a node and all its ancestors as dirty.
pub(crate) fn mark_dirty(doc: &mut Document, handle: u32) {
    mark_dirty_ancestors(doc, handle);
}

/// Propagate dirty flag up to ancestors.
fn mark_dirty_ancestors(doc: &mut Document, handle: u32) {
    let mut current = handle;
    while let Some(node) = doc.nodes.get_mut(&current) {
        node.dirty = true;
        if let Some(parent) = node.parent {
            current = parent;
        } else {
            break;
        }
    }
}

/// Clear dirty flags on all nodes.
pub(crate) fn clear_dirty_flags(doc: &mut Document) {
    for node in doc.nodes.values_mut() {
        node.dirty = false;
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Nearest inclusive ancestor of the given kind (`Element.closest`).
pub(crate) fn closest(doc: &Document, handle: u32, kind: NodeKind) -> Option<u32> {
    let mut current = Some(handle);
    while let Some(h) = current {
        let node = doc.nodes.get(&h)?;
        if node.kind == kind {
            return Some(h);
        }
        current = node.parent;
    }
    None
}

/// Nearest strict ancestor of the given kind.
pub(crate) fn closest_above(doc: &Document, handle: u32, kind: NodeKind) -> Option<u32> {
    let parent = doc.nodes.get(&handle)?.parent?;
    closest(doc, parent, kind)
}

/// Whether `handle` is `ancestor` or lies inside it.
pub(crate) fn is_descendant_of(doc: &Document, handle: u32, ancestor: u32) -> bool {
    let mut current = Some(handle);
    while let Some(h) = current {
        if h == ancestor {
            return true;
        }
        current = doc.nodes.get(&h).and_then(|n| n.parent);
    }
    false
}

/// Descendants of `handle` matching `pred`, in document order (self excluded).
pub(crate) fn find_all(doc: &Document, handle: u32, pred: impl Fn(&NavNode) -> bool) -> Vec<u32> {
    let mut result = Vec::new();
    if let Some(node) = doc.nodes.get(&handle) {
        for &child in &node.children {
            collect_recursive(doc, child, &pred, &mut result);
        }
    }
    result
}

fn collect_recursive(
    doc: &Document,
    handle: u32,
    pred: &impl Fn(&NavNode) -> bool,
    result: &mut Vec<u32>,
) {
    if let Some(node) = doc.nodes.get(&handle) {
        if pred(node) {
            result.push(handle);
        }
        for &child in &node.children {
            collect_recursive(doc, child, pred, result);
        }
    }
}

pub(crate) fn find_all_of_kind(doc: &Document, handle: u32, kind: NodeKind) -> Vec<u32> {
    find_all(doc, handle, |n| n.kind == kind)
}

/// First descendant of the given kind, in document order.
pub(crate) fn find_first(doc: &Document, handle: u32, kind: NodeKind) -> Option<u32> {
    find_all_of_kind(doc, handle, kind).into_iter().next()
}

/// Direct child of the given kind.
pub(crate) fn child_of_kind(doc: &Document, handle: u32, kind: NodeKind) -> Option<u32> {
    doc.nodes
        .get(&handle)?
        .children
        .iter()
        .copied()
        .find(|c| doc.kind(*c) == Some(kind))
}

/// Concatenated text of a node and its descendants.
pub(crate) fn text_content(doc: &Document, handle: u32) -> String {
    let mut out = String::new();
    if let Some(node) = doc.nodes.get(&handle) {
        out.push_str(&node.text);
        for &child in &node.children {
            out.push_str(&text_content(doc, child));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Document;
    use crate::host::MockBackend;

    fn test_doc() -> Document {
        Document::new(Box::new(MockBackend::new(1280.0, 800.0)))
    }

    #[test]
    fn test_create_and_destroy() {
        let mut doc = test_doc();
        let h = create_node(&mut doc, NodeKind::Container).unwrap();
        assert!(h > 0);
        assert!(doc.nodes.contains_key(&h));

        destroy_node(&mut doc, h).unwrap();
        assert!(!doc.nodes.contains_key(&h));
        assert!(destroy_node(&mut doc, h).is_err());
    }

    #[test]
    fn test_append_and_remove_child() {
        let mut doc = test_doc();
        let parent = create_node(&mut doc, NodeKind::NavItem).unwrap();
        let child = create_node(&mut doc, NodeKind::NavLink).unwrap();

        append_child(&mut doc, parent, child).unwrap();
        assert_eq!(doc.nodes[&parent].children, vec![child]);
        assert_eq!(doc.nodes[&child].parent, Some(parent));

        // Re-appending is idempotent
        append_child(&mut doc, parent, child).unwrap();
        assert_eq!(doc.nodes[&parent].children, vec![child]);

        remove_child(&mut doc, parent, child).unwrap();
        assert!(doc.nodes[&parent].children.is_empty());
        assert_eq!(doc.nodes[&child].parent, None);
    }

    #[test]
    fn test_reparent_moves_child() {
        let mut doc = test_doc();
        let a = create_node(&mut doc, NodeKind::Container).unwrap();
        let b = create_node(&mut doc, NodeKind::Container).unwrap();
        let c = create_node(&mut doc, NodeKind::Link).unwrap();

        append_child(&mut doc, a, c).unwrap();
        append_child(&mut doc, b, c).unwrap();
        assert!(doc.nodes[&a].children.is_empty());
        assert_eq!(doc.nodes[&b].children, vec![c]);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut doc = test_doc();
        let outer = create_node(&mut doc, NodeKind::Container).unwrap();
        let inner = create_node(&mut doc, NodeKind::Container).unwrap();
        append_child(&mut doc, outer, inner).unwrap();

        let result = append_child(&mut doc, inner, outer);
        assert!(matches!(result, Err(NavError::Cycle { .. })));
    }

    #[test]
    fn test_dirty_propagation() {
        let mut doc = test_doc();
        let root = create_node(&mut doc, NodeKind::Header).unwrap();
        let mid = create_node(&mut doc, NodeKind::MainNav).unwrap();
        let leaf = create_node(&mut doc, NodeKind::NavLink).unwrap();

        append_child(&mut doc, root, mid).unwrap();
        append_child(&mut doc, mid, leaf).unwrap();

        clear_dirty_flags(&mut doc);
        assert!(!doc.nodes[&root].dirty);

        mark_dirty(&mut doc, leaf);
        assert!(doc.nodes[&leaf].dirty);
        assert!(doc.nodes[&mid].dirty);
        assert!(doc.nodes[&root].dirty);
    }

    #[test]
    fn test_sequential_handles() {
        let mut doc = test_doc();
        let h1 = create_node(&mut doc, NodeKind::Container).unwrap();
        let h2 = create_node(&mut doc, NodeKind::Link).unwrap();
        let h3 = create_node(&mut doc, NodeKind::Popup).unwrap();
        assert_eq!((h1, h2, h3), (1, 2, 3));
    }

    #[test]
    fn test_closest_and_document_order() {
        let mut doc = test_doc();
        let item = create_node(&mut doc, NodeKind::NavItem).unwrap();
        let popup = create_node(&mut doc, NodeKind::Popup).unwrap();
        let col = create_node(&mut doc, NodeKind::Column).unwrap();
        let l1 = create_node(&mut doc, NodeKind::Link).unwrap();
        let l2 = create_node(&mut doc, NodeKind::Link).unwrap();

        append_child(&mut doc, item, popup).unwrap();
        append_child(&mut doc, popup, col).unwrap();
        append_child(&mut doc, col, l1).unwrap();
        append_child(&mut doc, col, l2).unwrap();

        assert_eq!(closest(&doc, l2, NodeKind::Popup), Some(popup));
        assert_eq!(closest(&doc, col, NodeKind::Column), Some(col));
        assert_eq!(closest_above(&doc, col, NodeKind::Column), None);
        assert_eq!(find_all_of_kind(&doc, item, NodeKind::Link), vec![l1, l2]);
        assert_eq!(child_of_kind(&doc, item, NodeKind::Popup), Some(popup));
        assert!(is_descendant_of(&doc, l1, item));
        assert!(!is_descendant_of(&doc, item, l1));
    }

    #[test]
    fn test_text_content_concatenates() {
        let mut doc = test_doc();
        let h = create_node(&mut doc, NodeKind::Headline).unwrap();
        let span = create_node(&mut doc, NodeKind::Container).unwrap();
        append_child(&mut doc, h, span).unwrap();
        doc.nodes.get_mut(&h).unwrap().text = "Shop ".into();
        doc.nodes.get_mut(&span).unwrap().text = "all".into();
        assert_eq!(text_content(&doc, h), "Shop all");
    }
}
