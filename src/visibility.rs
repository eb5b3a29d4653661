//! Visibility Oracle — focus eligibility from rendered state.
//!
//! A node is eligible when it is attached to the rendered tree, has a
//! non-zero box, and is not `visibility: hidden`. Nothing is cached here:
//! controllers change the state CSS reacts to between calls, so every
//! query goes through a fresh (lazily recomputed) layout.

use crate::context::Document;
use crate::layout;
use crate::style;
use crate::tree;

/// Whether `handle` can receive keyboard focus right now.
pub(crate) fn is_visible(doc: &mut Document, handle: u32) -> bool {
    let Some(root) = doc.root else {
        return false;
    };
    if !doc.nodes.contains_key(&handle) || !tree::is_descendant_of(doc, handle, root) {
        return false;
    }

    let desktop = doc.is_desktop();
    if style::is_hidden_by_display(doc, handle, desktop) {
        return false;
    }

    let rect = match layout::absolute_box(doc, handle) {
        Ok(rect) => rect,
        Err(e) => {
            tracing::debug!(handle, error = %e, "visibility: layout unavailable");
            return false;
        }
    };
    if rect.width <= 0.0 && rect.height <= 0.0 {
        return false;
    }

    !style::is_visibility_hidden(doc, handle)
}
