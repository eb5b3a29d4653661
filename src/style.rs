//! Style Module — CSS-equivalent projection of navigation state.
//!
//! Responsibilities:
//! - Decide `display: none` from author rules, breakpoint, and the ARIA/class
//!   state the controllers write (open popups, expanded headlines, curtain)
//! - Resolve inherited `visibility: hidden`
//! - Push the result into Taffy styles before each layout pass
//!
//! Controllers never read these rules directly. They only observe the
//! outcome through the Visibility Oracle, the same way script observes CSS.

use taffy::prelude::*;
use taffy::style_helpers::{auto, length};

use crate::context::Document;
use crate::error::Result;
use crate::tree;
use crate::types::{NodeClasses, NodeKind};

/// The section headline, if it has non-empty text.
pub(crate) fn section_headline(doc: &Document, section: u32) -> Option<u32> {
    let headline = tree::child_of_kind(doc, section, NodeKind::Headline)?;
    if tree::text_content(doc, headline).trim().is_empty() {
        None
    } else {
        Some(headline)
    }
}

/// Whether the node itself is `display: none` (ancestors not considered).
pub(crate) fn is_display_none(doc: &Document, handle: u32, desktop: bool) -> bool {
    let Some(node) = doc.nodes.get(&handle) else {
        return true;
    };
    if node.display_none || !node.breakpoint.shown(desktop) {
        return true;
    }
    match node.kind {
        NodeKind::Popup if !node.classes.contains(NodeClasses::OPEN_POPUP) => return true,
        NodeKind::Curtain if !node.classes.contains(NodeClasses::CURTAIN_OPEN) => return true,
        NodeKind::Headline => return false,
        _ => {}
    }

    // Collapsed section: everything but the headline is hidden on mobile.
    if desktop {
        return false;
    }
    match node.parent {
        Some(parent) if doc.kind(parent) == Some(NodeKind::Section) => {
            section_headline(doc, parent).is_some_and(|h| !doc.is_expanded(h))
        }
        _ => false,
    }
}

/// Whether the node or one of its ancestors is `display: none`.
pub(crate) fn is_hidden_by_display(doc: &Document, handle: u32, desktop: bool) -> bool {
    let mut current = Some(handle);
    while let Some(h) = current {
        if is_display_none(doc, h, desktop) {
            return true;
        }
        current = doc.nodes.get(&h).and_then(|n| n.parent);
    }
    false
}

/// `visibility: hidden` inherits unless the tree says otherwise.
pub(crate) fn is_visibility_hidden(doc: &Document, handle: u32) -> bool {
    let mut current = Some(handle);
    while let Some(h) = current {
        match doc.nodes.get(&h) {
            Some(node) if node.visibility_hidden => return true,
            Some(node) => current = node.parent,
            None => return false,
        }
    }
    false
}

/// Write display and inline offsets into Taffy styles.
/// Uses read-modify-write so host-provided sizes survive.
pub(crate) fn apply_state_styles(doc: &mut Document) -> Result<()> {
    let desktop = doc.is_desktop();
    let updates: Vec<(taffy::NodeId, bool, Option<f32>, NodeKind)> = doc
        .nodes
        .iter()
        .map(|(&h, n)| {
            (
                n.taffy_node,
                is_display_none(doc, h, desktop),
                n.offset_left,
                n.kind,
            )
        })
        .collect();

    for (taffy_node, none, offset_left, kind) in updates {
        let mut style = doc.tree.style(taffy_node)?.clone();
        let display = if none { Display::None } else { Display::Flex };
        let inset_left = match (kind, offset_left) {
            (NodeKind::Popup, Some(left)) => length(left),
            (NodeKind::Popup, None) => auto(),
            _ => style.inset.left,
        };
        if style.display != display || style.inset.left != inset_left {
            style.display = display;
            style.inset.left = inset_left;
            doc.tree.set_style(taffy_node, style)?;
        }
    }
    Ok(())
}
