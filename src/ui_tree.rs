// UI tree model. The tree is owned by the foreground application and handed
// to the engine one event at a time; handles are cheap clones but must never
// be cached across event boundaries (the platform may invalidate them).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

struct NodeInner {
    text: Option<String>,
    description: Option<String>,
    class_name: Option<String>,
    clickable: bool,
    visible: bool,
    // Slots mirror the reported child count; a slot can be empty when the
    // platform reports a child it cannot hand over. Traversals skip those.
    children: OnceLock<Vec<Option<UiNode>>>,
    parent: OnceLock<Weak<NodeInner>>,
    stale: AtomicBool,
}

/// Handle to one element of the foreground application's UI tree.
#[derive(Clone)]
pub struct UiNode(Arc<NodeInner>);

impl UiNode {
    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.0.class_name.as_deref()
    }

    pub fn is_clickable(&self) -> bool {
        self.0.clickable
    }

    pub fn is_visible_to_user(&self) -> bool {
        self.0.visible
    }

    pub fn child_count(&self) -> usize {
        self.0.children.get().map(|c| c.len()).unwrap_or(0)
    }

    /// Fetch a child by index. `None` for an out-of-range index or for a
    /// reported-but-unavailable slot.
    pub fn child(&self, index: usize) -> Option<UiNode> {
        self.0.children.get()?.get(index)?.clone()
    }

    pub fn children(&self) -> impl Iterator<Item = UiNode> + '_ {
        (0..self.child_count()).filter_map(|i| self.child(i))
    }

    pub fn parent(&self) -> Option<UiNode> {
        self.0.parent.get()?.upgrade().map(UiNode)
    }

    /// Same underlying element, not structural equality.
    pub fn same_as(&self, other: &UiNode) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Raised by the platform when the element no longer exists in the live
    /// tree. A stale node rejects any further action request.
    pub fn mark_stale(&self) {
        self.0.stale.store(true, Ordering::SeqCst);
    }

    pub fn is_stale(&self) -> bool {
        self.0.stale.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for UiNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiNode")
            .field("class", &self.class_name())
            .field("text", &self.text())
            .field("desc", &self.description())
            .field("clickable", &self.is_clickable())
            .field("children", &self.child_count())
            .finish()
    }
}

/// Builder for synthetic trees (tests and scripted demo windows).
#[derive(Default)]
pub struct NodeBuilder {
    text: Option<String>,
    description: Option<String>,
    class_name: Option<String>,
    clickable: bool,
    visible: bool,
    children: Vec<Option<NodeBuilder>>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class_name = Some(class.to_string());
        self
    }

    pub fn clickable(mut self, clickable: bool) -> Self {
        self.clickable = clickable;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn child(mut self, child: NodeBuilder) -> Self {
        self.children.push(Some(child));
        self
    }

    /// A slot the platform reports but cannot hand over.
    pub fn missing_child(mut self) -> Self {
        self.children.push(None);
        self
    }

    pub fn build(self) -> UiNode {
        self.build_with_parent(Weak::new())
    }

    fn build_with_parent(self, parent: Weak<NodeInner>) -> UiNode {
        let inner = Arc::new(NodeInner {
            text: self.text,
            description: self.description,
            class_name: self.class_name,
            clickable: self.clickable,
            visible: self.visible,
            children: OnceLock::new(),
            parent: OnceLock::new(),
            stale: AtomicBool::new(false),
        });
        let _ = inner.parent.set(parent);

        let weak = Arc::downgrade(&inner);
        let built: Vec<Option<UiNode>> = self
            .children
            .into_iter()
            .map(|slot| slot.map(|b| b.build_with_parent(weak.clone())))
            .collect();
        let _ = inner.children.set(built);

        UiNode(inner)
    }
}

// =====================================================
// Snapshot dump format (JSON)
// =====================================================

#[derive(Debug, Serialize, Deserialize, Default)]
struct NodeDump {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    desc: Option<String>,
    #[serde(default)]
    clickable: bool,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    children: Vec<NodeDump>,
}

fn default_visible() -> bool {
    true
}

impl NodeDump {
    fn into_builder(self) -> NodeBuilder {
        let mut builder = NodeBuilder::new()
            .clickable(self.clickable)
            .visible(self.visible);
        if let Some(class) = self.class {
            builder = builder.class(&class);
        }
        if let Some(text) = self.text {
            builder = builder.text(&text);
        }
        if let Some(desc) = self.desc {
            builder = builder.desc(&desc);
        }
        for child in self.children {
            builder = builder.child(child.into_builder());
        }
        builder
    }

    fn from_node(node: &UiNode) -> Self {
        Self {
            class: node.class_name().map(str::to_string),
            text: node.text().map(str::to_string),
            desc: node.description().map(str::to_string),
            clickable: node.is_clickable(),
            visible: node.is_visible_to_user(),
            children: node.children().map(|c| Self::from_node(&c)).collect(),
        }
    }
}

/// Parse a JSON snapshot dump into a tree.
pub fn parse_tree(raw: &str) -> Result<UiNode> {
    let dump: NodeDump = serde_json::from_str(raw).context("Failed to parse UI tree dump")?;
    Ok(dump.into_builder().build())
}

pub fn tree_to_json(root: &UiNode) -> String {
    serde_json::to_string_pretty(&NodeDump::from_node(root)).unwrap_or_else(|_| "{}".to_string())
}

/// Indented one-line-per-node dump, for debugging tree shapes.
pub fn dump_tree(node: &UiNode, depth: usize) {
    let indent = " ".repeat(depth * 2);
    println!(
        "{}Class: {:?}, Text: {:?}, Desc: {:?}, Clickable: {}",
        indent,
        node.class_name().unwrap_or(""),
        node.text().unwrap_or(""),
        node.description().unwrap_or(""),
        node.is_clickable()
    );
    for child in node.children() {
        dump_tree(&child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_links_resolve_upward() {
        let root = NodeBuilder::new()
            .class("android.widget.FrameLayout")
            .child(NodeBuilder::new().text("Alice"))
            .build();

        let child = root.child(0).unwrap();
        let parent = child.parent().unwrap();
        assert!(parent.same_as(&root));
        assert!(root.parent().is_none());
    }

    #[test]
    fn missing_child_slot_is_counted_but_absent() {
        let root = NodeBuilder::new()
            .missing_child()
            .child(NodeBuilder::new().text("here"))
            .build();

        assert_eq!(root.child_count(), 2);
        assert!(root.child(0).is_none());
        assert_eq!(root.child(1).unwrap().text(), Some("here"));
        assert_eq!(root.children().count(), 1);
    }

    #[test]
    fn stale_flag_round_trip() {
        let node = NodeBuilder::new().clickable(true).build();
        assert!(!node.is_stale());
        node.mark_stale();
        assert!(node.is_stale());
    }

    #[test]
    fn parses_snapshot_dump() {
        let raw = r#"{
            "class": "android.widget.RelativeLayout",
            "clickable": true,
            "children": [
                {"class": "android.widget.TextView", "text": "Alice"},
                {"desc": "meet.google.com/abc-defg-hij", "visible": false}
            ]
        }"#;
        let root = parse_tree(raw).unwrap();
        assert!(root.is_clickable());
        assert_eq!(root.child_count(), 2);
        assert_eq!(root.child(0).unwrap().text(), Some("Alice"));
        let link = root.child(1).unwrap();
        assert_eq!(link.description(), Some("meet.google.com/abc-defg-hij"));
        assert!(!link.is_visible_to_user());
    }

    #[test]
    fn json_round_trip_preserves_shape() {
        let root = NodeBuilder::new()
            .class("android.widget.FrameLayout")
            .clickable(true)
            .child(NodeBuilder::new().text("hello").visible(false))
            .build();
        let reparsed = parse_tree(&tree_to_json(&root)).unwrap();
        assert_eq!(reparsed.child_count(), 1);
        assert_eq!(reparsed.child(0).unwrap().text(), Some("hello"));
        assert!(!reparsed.child(0).unwrap().is_visible_to_user());
    }
}
