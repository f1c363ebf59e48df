//! HostTree - Arena-backed mirror of the host document
//!
//! The engine never touches the real DOM directly; the host mirrors its
//! tree in (whole snapshots or incremental edits) and applies the engine's
//! marker/panel insertions back out. Node ids are arena indices and are
//! never reused within a view, so they double as stable identity keys for
//! the processed-node side table.
//!
//! Every structural or textual edit appends to a mutation log, the mirror
//! of a childList+subtree observer. The scheduler drains the log; draining
//! it again right after a pass is what keeps the engine's own insertions
//! from re-triggering scans.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

// =============================================================================
// Constants
// =============================================================================

/// Tag used for inserted term markers.
pub const MARKER_TAG: &str = "gc-marker";

/// Tag used for the (single) open definition panel.
pub const PANEL_TAG: &str = "gc-popup";

// =============================================================================
// Types
// =============================================================================

/// Stable per-view node identity (arena index, never reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Rehydrate an id the host mirrored out earlier.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: HashMap<String, String>,
        /// Mirrors "has no rendered size" on the host side.
        hidden: bool,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    detached: bool,
}

/// What changed, in observer granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children added or removed under the target.
    ChildList,
    /// Text content of the target changed.
    Text,
    /// A single attribute of the target changed.
    Attribute { name: String },
}

#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// JSON hydration model: one host node and its subtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSnapshot {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub children: Vec<NodeSnapshot>,
}

// =============================================================================
// HostTree
// =============================================================================

pub struct HostTree {
    nodes: Vec<NodeData>,
    root: NodeId,
    mutations: Vec<MutationRecord>,
}

impl Default for HostTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree {
    pub fn new() -> Self {
        let root = NodeData {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attrs: HashMap::new(),
                hidden: false,
            },
            detached: false,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            mutations: Vec::new(),
        }
    }

    /// Build a tree from a nested snapshot. A snapshot node with `text` is
    /// a text node; anything else is an element (tag defaults to "div").
    pub fn from_snapshot(snapshot: &NodeSnapshot) -> Self {
        let mut tree = Self::new();
        for child in &snapshot.children {
            tree.graft(tree.root, child);
        }
        // Hydration is not host activity
        tree.mutations.clear();
        tree
    }

    fn graft(&mut self, parent: NodeId, snapshot: &NodeSnapshot) {
        if let Some(text) = &snapshot.text {
            self.append_text(parent, text);
            return;
        }
        let tag = snapshot.tag.as_deref().unwrap_or("div");
        let id = self.append_element(parent, tag);
        for (name, value) in &snapshot.attrs {
            self.set_attr(id, name, value);
        }
        if snapshot.hidden {
            self.set_hidden(id, true);
        }
        for child in &snapshot.children {
            self.graft(id, child);
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.detached).count()
    }

    // ------------------------------------------------------------------
    // Structure edits
    // ------------------------------------------------------------------

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.push_node(NodeKind::Element {
            tag: tag.to_string(),
            attrs: HashMap::new(),
            hidden: false,
        });
        self.attach(parent, id, None);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push_node(NodeKind::Text { text: text.to_string() });
        self.attach(parent, id, None);
        id
    }

    /// Insert a fresh element immediately before `reference` under its
    /// parent. This is the marker insertion primitive.
    pub fn insert_element_before(&mut self, reference: NodeId, tag: &str) -> Result<NodeId, String> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| format!("node {:?} has no parent", reference))?;
        if self.is_detached(reference) {
            return Err(format!("node {:?} is detached", reference));
        }
        let id = self.push_node(NodeKind::Element {
            tag: tag.to_string(),
            attrs: HashMap::new(),
            hidden: false,
        });
        self.attach(parent, id, Some(reference));
        Ok(id)
    }

    /// Detach a subtree. The arena slots stay allocated (ids are never
    /// reused) but the nodes disappear from traversal.
    pub fn remove(&mut self, node: NodeId) -> Result<(), String> {
        if node == self.root {
            return Err("cannot remove the root".to_string());
        }
        if self.is_detached(node) {
            return Ok(());
        }
        let parent = self.nodes[node.index()].parent;
        if let Some(parent) = parent {
            let children = &mut self.nodes[parent.index()].children;
            children.retain(|c| *c != node);
            self.record(parent, MutationKind::ChildList);
        }
        self.nodes[node.index()].parent = None;
        self.detach_recursive(node);
        Ok(())
    }

    fn detach_recursive(&mut self, node: NodeId) {
        self.nodes[node.index()].detached = true;
        let children = self.nodes[node.index()].children.clone();
        for child in children {
            self.detach_recursive(child);
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), String> {
        match &mut self.nodes[node.index()].kind {
            NodeKind::Text { text: slot } => {
                *slot = text.to_string();
                self.record(node, MutationKind::Text);
                Ok(())
            }
            NodeKind::Element { .. } => Err(format!("node {:?} is not a text node", node)),
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.index()].kind {
            attrs.insert(name.to_string(), value.to_string());
            self.record(node, MutationKind::Attribute { name: name.to_string() });
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.index()].kind {
            if attrs.remove(name).is_some() {
                self.record(node, MutationKind::Attribute { name: name.to_string() });
            }
        }
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        if let NodeKind::Element { hidden: slot, .. } = &mut self.nodes[node.index()].kind {
            if *slot != hidden {
                *slot = hidden;
                self.record(node, MutationKind::Attribute { name: "hidden".to_string() });
            }
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index())?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index()].children
    }

    pub fn is_detached(&self, node: NodeId) -> bool {
        self.nodes.get(node.index()).map(|n| n.detached).unwrap_or(true)
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.index()].kind, NodeKind::Text { .. })
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Text { text } => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.index()).map(|n| &n.kind),
            Some(NodeKind::Element { hidden: true, .. })
        )
    }

    pub fn is_marker(&self, node: NodeId) -> bool {
        self.tag(node) == Some(MARKER_TAG)
    }

    pub fn is_panel(&self, node: NodeId) -> bool {
        self.tag(node) == Some(PANEL_TAG)
    }

    /// Ancestor chain starting at the node itself.
    pub fn ancestors_inclusive(&self, node: NodeId) -> AncestorIter<'_> {
        AncestorIter { tree: self, next: Some(node) }
    }

    /// Ancestor-inclusive containment: true when `node` is `ancestor` or
    /// sits anywhere inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors_inclusive(node).any(|a| a == ancestor)
    }

    /// Hash of all attached text content, in document order, excluding
    /// the engine's own panel subtrees. Stable across marker insertion,
    /// so a re-pass over an unchanged view can be skipped.
    pub fn text_fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.is_panel(node) {
                continue;
            }
            if let Some(text) = self.text(node) {
                text.hash(&mut hasher);
            }
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        hasher.finish()
    }

    // ------------------------------------------------------------------
    // Mutation log
    // ------------------------------------------------------------------

    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    pub fn pending_mutations(&self) -> usize {
        self.mutations.len()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            kind,
            detached: false,
        });
        id
    }

    fn attach(&mut self, parent: NodeId, node: NodeId, before: Option<NodeId>) {
        self.nodes[node.index()].parent = Some(parent);
        let children = &mut self.nodes[parent.index()].children;
        match before.and_then(|b| children.iter().position(|c| *c == b)) {
            Some(pos) => children.insert(pos, node),
            None => children.push(node),
        }
        self.record(parent, MutationKind::ChildList);
    }

    fn record(&mut self, target: NodeId, kind: MutationKind) {
        self.mutations.push(MutationRecord { target, kind });
    }
}

pub struct AncestorIter<'t> {
    tree: &'t HostTree,
    next: Option<NodeId>,
}

impl<'t> Iterator for AncestorIter<'t> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_traverse() {
        let mut tree = HostTree::new();
        let div = tree.append_element(tree.root(), "div");
        let text = tree.append_text(div, "Deals");

        assert_eq!(tree.parent(text), Some(div));
        assert_eq!(tree.children(div), &[text]);
        assert_eq!(tree.text(text), Some("Deals"));
        assert_eq!(tree.tag(div), Some("div"));
    }

    #[test]
    fn test_insert_before_places_sibling_first() {
        let mut tree = HostTree::new();
        let div = tree.append_element(tree.root(), "div");
        let text = tree.append_text(div, "Deals");
        let marker = tree.insert_element_before(text, MARKER_TAG).unwrap();

        assert_eq!(tree.children(div), &[marker, text]);
        assert!(tree.is_marker(marker));
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut tree = HostTree::new();
        let div = tree.append_element(tree.root(), "div");
        let inner = tree.append_element(div, "span");
        let text = tree.append_text(inner, "Deals");

        tree.remove(div).unwrap();
        assert!(tree.is_detached(div));
        assert!(tree.is_detached(inner));
        assert!(tree.is_detached(text));
        assert!(tree.children(tree.root()).is_empty());
    }

    #[test]
    fn test_insert_before_detached_fails() {
        let mut tree = HostTree::new();
        let div = tree.append_element(tree.root(), "div");
        let text = tree.append_text(div, "Deals");
        tree.remove(div).unwrap();

        assert!(tree.insert_element_before(text, MARKER_TAG).is_err());
    }

    #[test]
    fn test_mutation_log_records_edits() {
        let mut tree = HostTree::new();
        let div = tree.append_element(tree.root(), "div");
        let text = tree.append_text(div, "Deals");
        tree.take_mutations();

        tree.set_text(text, "Companies").unwrap();
        tree.set_attr(div, "class", "left-sidebar");
        let records = tree.take_mutations();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, MutationKind::Text);
        assert_eq!(records[1].kind, MutationKind::Attribute { name: "class".to_string() });
        assert_eq!(tree.pending_mutations(), 0);
    }

    #[test]
    fn test_contains_is_ancestor_inclusive() {
        let mut tree = HostTree::new();
        let outer = tree.append_element(tree.root(), "div");
        let inner = tree.append_element(outer, "span");
        let text = tree.append_text(inner, "x");
        let sibling = tree.append_element(tree.root(), "div");

        assert!(tree.contains(outer, text));
        assert!(tree.contains(outer, outer));
        assert!(!tree.contains(outer, sibling));
    }

    #[test]
    fn test_snapshot_hydration() {
        let json = r#"{
            "children": [
                {"tag": "nav", "attrs": {"role": "navigation"}, "children": [
                    {"tag": "span", "children": [{"text": "Deals"}]}
                ]},
                {"tag": "div", "hidden": true, "children": [{"text": "invisible"}]}
            ]
        }"#;
        let snapshot: NodeSnapshot = serde_json::from_str(json).unwrap();
        let tree = HostTree::from_snapshot(&snapshot);

        assert_eq!(tree.children(tree.root()).len(), 2);
        let nav = tree.children(tree.root())[0];
        assert_eq!(tree.tag(nav), Some("nav"));
        assert_eq!(tree.attr(nav, "role"), Some("navigation"));
        let hidden = tree.children(tree.root())[1];
        assert!(tree.is_hidden(hidden));
        // Hydration leaves no pending host mutations
        assert_eq!(tree.pending_mutations(), 0);
    }

    #[test]
    fn test_text_fingerprint_ignores_markers_and_panels() {
        let mut tree = HostTree::new();
        let div = tree.append_element(tree.root(), "div");
        let text = tree.append_text(div, "Deals");
        let before = tree.text_fingerprint();

        tree.insert_element_before(text, MARKER_TAG).unwrap();
        let panel = tree.append_element(tree.root(), PANEL_TAG);
        tree.append_text(panel, "A deal is a transaction.");
        assert_eq!(tree.text_fingerprint(), before);

        tree.set_text(text, "Companies").unwrap();
        assert_ne!(tree.text_fingerprint(), before);
    }

    #[test]
    fn test_node_ids_not_reused_after_removal() {
        let mut tree = HostTree::new();
        let a = tree.append_element(tree.root(), "div");
        tree.remove(a).unwrap();
        let b = tree.append_element(tree.root(), "div");
        assert_ne!(a, b);
    }
}
