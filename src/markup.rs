//! Markup Module — CMS-rendered header markup as JSON.
//!
//! Responsibilities:
//! - Describe a header subtree (kinds, text, sizes, author rules, ARIA state)
//! - Mirror it into the node tree in one call
//! - Attach lazily rendered popups and fire the tree-mutation notification
//!
//! The core never invents markup; this is only a bulk alternative to
//! building the same tree node by node over FFI.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::context::{Document, NavContext};
use crate::error::Result;
use crate::layout;
use crate::tree;
use crate::types::{AnalyticsState, Breakpoint, NodeClasses, NodeKind};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub kind: NodeKind,
    /// Host-side name, reported back so the host can map handles.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    /// Author `display: none`.
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub visibility_hidden: bool,
    #[serde(default)]
    pub breakpoint: Option<Breakpoint>,
    #[serde(default)]
    pub haspopup: bool,
    #[serde(default)]
    pub expanded: Option<bool>,
    /// The analytics attribute is present on this node.
    #[serde(default)]
    pub analytics: bool,
    #[serde(default)]
    pub full_width: bool,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

/// Handles created by a load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loaded {
    pub root: u32,
    pub ids: HashMap<String, u32>,
}

#[cfg(test)]
impl Loaded {
    /// Handle for a named node. Unknown names map to the invalid handle.
    pub fn id(&self, name: &str) -> u32 {
        self.ids.get(name).copied().unwrap_or(0)
    }
}

fn build(doc: &mut Document, spec: &NodeSpec, ids: &mut HashMap<String, u32>) -> Result<u32> {
    let handle = tree::create_node(doc, spec.kind)?;
    if let Some(node) = doc.nodes.get_mut(&handle) {
        node.text = spec.text.clone();
        node.display_none = spec.hidden;
        node.visibility_hidden = spec.visibility_hidden;
        if let Some(bp) = spec.breakpoint {
            node.breakpoint = bp;
        }
        node.aria_haspopup = spec.haspopup;
        node.aria_expanded = spec.expanded;
        if spec.analytics {
            node.analytics = Some(if spec.expanded == Some(true) {
                AnalyticsState::Close
            } else {
                AnalyticsState::Open
            });
        }
        if spec.full_width {
            node.classes.insert(NodeClasses::FULL_WIDTH);
        }
    }
    if let Some(width) = spec.width {
        layout::set_dimension(doc, handle, 0, width, 1)?;
    }
    if let Some(height) = spec.height {
        layout::set_dimension(doc, handle, 1, height, 1)?;
    }
    if let Some(id) = &spec.id {
        ids.insert(id.clone(), handle);
    }

    for child in &spec.children {
        let child_handle = build(doc, child, ids)?;
        tree::append_child(doc, handle, child_handle)?;
    }
    Ok(handle)
}

pub fn parse(json: &str) -> Result<NodeSpec> {
    Ok(serde_json::from_str(json)?)
}

/// Mirror a full header and make it the document root.
pub(crate) fn load_markup(doc: &mut Document, json: &str) -> Result<Loaded> {
    let spec = parse(json)?;
    let mut ids = HashMap::new();
    let root = build(doc, &spec, &mut ids)?;
    doc.root = Some(root);
    debug!(root, nodes = doc.nodes.len(), "load_markup");
    Ok(Loaded { root, ids })
}

/// Insert a subtree under `parent`, then notify the menu of the mutation.
pub(crate) fn attach_markup(ctx: &mut NavContext, parent: u32, json: &str) -> Result<Loaded> {
    ctx.doc.validate_handle(parent)?;
    let spec = parse(json)?;
    let mut ids = HashMap::new();
    let root = build(&mut ctx.doc, &spec, &mut ids)?;
    tree::append_child(&mut ctx.doc, parent, root)?;
    debug!(parent, root, "attach_markup");

    ctx.menu.on_tree_mutation(&mut ctx.doc, parent);
    Ok(Loaded { root, ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockBackend;

    fn test_ctx() -> NavContext {
        NavContext::new(Box::new(MockBackend::new(1280.0, 800.0)))
    }

    #[test]
    fn test_load_sets_root_and_attributes() {
        let mut ctx = test_ctx();
        let loaded = load_markup(
            &mut ctx.doc,
            r#"{"kind": "header", "children": [
                {"kind": "nav_item", "id": "item", "full_width": true, "children": [
                    {"kind": "nav_link", "id": "trigger", "text": "Products",
                     "haspopup": true, "expanded": false, "analytics": true}
                ]},
                {"kind": "brand", "id": "brand", "breakpoint": "desktop_only", "width": 120}
            ]}"#,
        )
        .unwrap();

        assert_eq!(ctx.doc.root, Some(loaded.root));
        let trigger = &ctx.doc.nodes[&loaded.id("trigger")];
        assert!(trigger.aria_haspopup);
        assert_eq!(trigger.aria_expanded, Some(false));
        assert_eq!(trigger.analytics, Some(AnalyticsState::Open));
        assert_eq!(trigger.text, "Products");
        assert!(ctx.doc.has_class(loaded.id("item"), NodeClasses::FULL_WIDTH));
        assert_eq!(
            ctx.doc.nodes[&loaded.id("brand")].breakpoint,
            Breakpoint::DesktopOnly
        );
        assert_eq!(loaded.id("missing"), 0);
    }

    #[test]
    fn test_rejects_unknown_fields_and_kinds() {
        let mut ctx = test_ctx();
        assert!(load_markup(&mut ctx.doc, r#"{"kind": "header", "colour": "red"}"#).is_err());
        assert!(load_markup(&mut ctx.doc, r#"{"kind": "marquee"}"#).is_err());
        assert_eq!(ctx.doc.root, None);
    }

    #[test]
    fn test_attach_requires_valid_parent() {
        let mut ctx = test_ctx();
        assert!(attach_markup(&mut ctx, 0, r#"{"kind": "popup"}"#).is_err());
        assert!(attach_markup(&mut ctx, 77, r#"{"kind": "popup"}"#).is_err());
    }

    #[test]
    fn test_attach_appends_subtree() {
        let mut ctx = test_ctx();
        let loaded = load_markup(
            &mut ctx.doc,
            r#"{"kind": "header", "children": [{"kind": "nav_item", "id": "item"}]}"#,
        )
        .unwrap();
        let item = loaded.id("item");
        let popup = attach_markup(
            &mut ctx,
            item,
            r#"{"kind": "popup", "children": [{"kind": "column", "children": [{"kind": "link"}]}]}"#,
        )
        .unwrap();
        assert_eq!(ctx.doc.nodes[&popup.root].parent, Some(item));
        assert_eq!(tree::find_all_of_kind(&ctx.doc, item, NodeKind::Link).len(), 1);
    }
}
