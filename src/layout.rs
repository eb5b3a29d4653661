//! Layout Module — Box metrics via Taffy.
//!
//! Responsibilities:
//! - Translate host size reports into Taffy Style mutations (read-modify-write)
//! - Compute layout from root against the polled viewport, lazily
//! - Provide absolute boxes for visibility and popup positioning

use crate::context::Document;
use crate::error::{NavError, Result};
use taffy::prelude::*;
use taffy::style_helpers::{auto, length, percent};

/// Absolute rendered box, relative to the viewport's left/top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoxRect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Set a dimension property (width, height, min/max variants).
/// Uses read-modify-write to preserve other properties.
pub(crate) fn set_dimension(
    doc: &mut Document,
    handle: u32,
    prop: u32,
    value: f32,
    unit: u8,
) -> Result<()> {
    let taffy_node = doc
        .nodes
        .get(&handle)
        .ok_or(NavError::InvalidHandle(handle))?
        .taffy_node;

    let mut style = doc.tree.style(taffy_node)?.clone();

    let dimension = match unit {
        0 => auto(),
        1 => length(value),
        2 => percent(value / 100.0),
        _ => return Err(NavError::Layout(format!("Invalid unit: {unit}"))),
    };

    match prop {
        0 => style.size.width = dimension,
        1 => style.size.height = dimension,
        2 => style.min_size.width = dimension,
        3 => style.min_size.height = dimension,
        4 => style.max_size.width = dimension,
        5 => style.max_size.height = dimension,
        _ => {
            return Err(NavError::Layout(format!(
                "Invalid dimension property: {prop}"
            )))
        }
    }

    doc.tree.set_style(taffy_node, style)?;

    crate::tree::mark_dirty(doc, handle);
    Ok(())
}

/// Set both width and height in px.
pub(crate) fn set_size(doc: &mut Document, handle: u32, width: f32, height: f32) -> Result<()> {
    set_dimension(doc, handle, 0, width, 1)?;
    set_dimension(doc, handle, 1, height, 1)
}

/// Set flex direction: 0 row, 1 column.
pub(crate) fn set_direction(doc: &mut Document, handle: u32, value: u32) -> Result<()> {
    let taffy_node = doc
        .nodes
        .get(&handle)
        .ok_or(NavError::InvalidHandle(handle))?
        .taffy_node;

    let mut style = doc.tree.style(taffy_node)?.clone();
    style.flex_direction = match value {
        0 => FlexDirection::Row,
        1 => FlexDirection::Column,
        _ => return Err(NavError::Layout(format!("Invalid flex_direction: {value}"))),
    };
    doc.tree.set_style(taffy_node, style)?;

    crate::tree::mark_dirty(doc, handle);
    Ok(())
}

/// Compute layout from root with the viewport as available space.
pub(crate) fn compute_layout(doc: &mut Document) -> Result<()> {
    let root_handle = doc.root.ok_or(NavError::NoRoot)?;
    let root_taffy = doc
        .nodes
        .get(&root_handle)
        .ok_or(NavError::InvalidHandle(root_handle))?
        .taffy_node;

    crate::style::apply_state_styles(doc)?;

    let (w, h) = doc.backend.viewport();
    doc.tree.compute_layout(
        root_taffy,
        Size {
            width: AvailableSpace::Definite(w),
            height: AvailableSpace::Definite(h),
        },
    )?;

    doc.laid_out_viewport = Some((w, h));
    crate::tree::clear_dirty_flags(doc);
    tracing::trace!(width = w, height = h, "compute_layout");
    Ok(())
}

/// Recompute only when the tree changed or the viewport moved.
pub(crate) fn ensure_layout(doc: &mut Document) -> Result<()> {
    let root = doc.root.ok_or(NavError::NoRoot)?;
    let stale = doc.nodes.get(&root).is_none_or(|n| n.dirty)
        || doc.laid_out_viewport != Some(doc.backend.viewport());
    if stale {
        compute_layout(doc)?;
    }
    Ok(())
}

/// Get the computed layout for a node relative to its parent.
pub(crate) fn get_layout(doc: &Document, handle: u32) -> Result<BoxRect> {
    let taffy_node = doc
        .nodes
        .get(&handle)
        .ok_or(NavError::InvalidHandle(handle))?
        .taffy_node;

    let layout = doc.tree.layout(taffy_node)?;

    Ok(BoxRect {
        x: layout.location.x,
        y: layout.location.y,
        width: layout.size.width,
        height: layout.size.height,
    })
}

/// Absolute box: parent-relative locations summed up to the root.
pub(crate) fn absolute_box(doc: &mut Document, handle: u32) -> Result<BoxRect> {
    ensure_layout(doc)?;
    let mut rect = get_layout(doc, handle)?;
    let mut current = doc.nodes.get(&handle).and_then(|n| n.parent);
    while let Some(h) = current {
        let parent = get_layout(doc, h)?;
        rect.x += parent.x;
        rect.y += parent.y;
        current = doc.nodes.get(&h).and_then(|n| n.parent);
    }
    Ok(rect)
}
