//! Annotator - Marker insertion, removal, and processed-node tracking
//!
//! Markers are non-text elements inserted as the preceding sibling of the
//! matched text node. Layout neutrality: the parent element reserves
//! inline space with font-relative leading padding and the marker is
//! absolutely positioned inside that reserved space, so the rendered text
//! never shifts and line-box height never changes.
//!
//! ProcessedIndex is a non-owning side table from node identity to the
//! generation it was annotated in. Teardown bumps the generation instead
//! of erasing entries one by one; a full wipe happens only when the view
//! itself goes away.

use std::collections::HashMap;

use crate::engine::popup::PopupState;
use crate::engine::section::Section;
use crate::engine::tree::{HostTree, NodeId, MARKER_TAG};
use crate::glossary::entry::GlossaryEntry;

// =============================================================================
// Constants
// =============================================================================

/// Class carried by every inserted marker.
pub const MARKER_CLASS: &str = "gc-term-marker";

/// Style stamped on the annotated parent: reserve leading space, anchor
/// the absolutely-positioned marker.
const PARENT_RESERVE_STYLE: &str = "position:relative;padding-left:1.1em";

/// Style of the marker itself, confined to the reserved space.
const MARKER_STYLE: &str = "position:absolute;left:0.1em;top:0;width:0.9em";

/// Attribute flagging an annotated parent, used for residue-free unwind.
const ANNOTATED_ATTR: &str = "data-gc-annotated";

// =============================================================================
// ProcessedIndex
// =============================================================================

/// Generation-stamped "already annotated" association.
#[derive(Debug, Default)]
pub struct ProcessedIndex {
    generation: u64,
    stamps: HashMap<NodeId, u64>,
}

impl ProcessedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, node: NodeId) -> bool {
        self.stamps.get(&node) == Some(&self.generation)
    }

    pub fn mark(&mut self, node: NodeId) {
        self.stamps.insert(node, self.generation);
    }

    /// Logical wipe: every existing stamp becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
    }

    /// Physical wipe, for view teardown.
    pub fn clear(&mut self) {
        self.stamps.clear();
        self.generation += 1;
    }
}

// =============================================================================
// Annotator
// =============================================================================

#[derive(Debug, Clone)]
pub struct MarkerRecord {
    pub marker: NodeId,
    pub host_node: NodeId,
    pub entry_id: String,
    pub section: Section,
    /// Parent style before we stamped it, for exact restoration.
    prior_parent_style: Option<String>,
    parent: NodeId,
}

#[derive(Default)]
pub struct Annotator {
    pub processed: ProcessedIndex,
    pub popup: PopupState,
    markers: Vec<MarkerRecord>,
}

impl Annotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn record_for_marker(&self, marker: NodeId) -> Option<&MarkerRecord> {
        self.markers.iter().find(|r| r.marker == marker)
    }

    /// Insert a marker for a matched text node.
    ///
    /// Idempotent: a node already in ProcessedIndex keeps its existing
    /// marker and nothing is inserted. Any per-node failure (e.g. the node
    /// was torn out of the tree mid-pass) is returned as an error for the
    /// caller to record; it must never abort the pass.
    pub fn annotate(
        &mut self,
        tree: &mut HostTree,
        node: NodeId,
        entry: &GlossaryEntry,
        section: Section,
    ) -> Result<NodeId, String> {
        if self.processed.is_processed(node) {
            return self
                .markers
                .iter()
                .find(|r| r.host_node == node)
                .map(|r| r.marker)
                .ok_or_else(|| format!("node {:?} processed but has no marker record", node));
        }

        if tree.is_detached(node) {
            return Err(format!("node {:?} left the tree before annotation", node));
        }
        let parent = tree
            .parent(node)
            .ok_or_else(|| format!("node {:?} has no parent element", node))?;

        let marker = tree.insert_element_before(node, MARKER_TAG)?;
        tree.set_attr(marker, "class", MARKER_CLASS);
        tree.set_attr(marker, "data-entry-id", &entry.id);
        tree.set_attr(marker, "style", MARKER_STYLE);

        let prior_parent_style = tree.attr(parent, "style").map(|s| s.to_string());
        let reserved = match &prior_parent_style {
            Some(prior) => format!("{};{}", prior, PARENT_RESERVE_STYLE),
            None => PARENT_RESERVE_STYLE.to_string(),
        };
        tree.set_attr(parent, "style", &reserved);
        tree.set_attr(parent, ANNOTATED_ATTR, "true");

        self.processed.mark(node);
        self.markers.push(MarkerRecord {
            marker,
            host_node: node,
            entry_id: entry.id.clone(),
            section,
            prior_parent_style,
            parent,
        });
        Ok(marker)
    }

    /// Remove every marker and panel, restore stamped parents, and reset
    /// all per-view state. Called on navigation away from the view.
    pub fn remove_all(&mut self, tree: &mut HostTree) {
        self.popup.close(tree);
        // Reverse order: two markers under one parent stack their style
        // stamps, so restoration has to unwind them LIFO.
        for record in self.markers.drain(..).rev() {
            let _ = tree.remove(record.marker);
            match &record.prior_parent_style {
                Some(prior) => tree.set_attr(record.parent, "style", prior),
                None => tree.remove_attr(record.parent, "style"),
            }
            tree.remove_attr(record.parent, ANNOTATED_ATTR);
        }
        self.processed.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::entry::EntryMetadata;

    fn entry(id: &str) -> GlossaryEntry {
        GlossaryEntry {
            id: id.to_string(),
            title: id.to_string(),
            trigger: id.to_string(),
            aliases: vec![],
            definition_html: String::new(),
            enabled: true,
            metadata: EntryMetadata::default(),
        }
    }

    fn label(tree: &mut HostTree) -> (NodeId, NodeId) {
        let span = tree.append_element(tree.root(), "span");
        let text = tree.append_text(span, "Deals");
        (span, text)
    }

    #[test]
    fn test_annotate_inserts_marker_before_text() {
        let mut tree = HostTree::new();
        let (span, text) = label(&mut tree);
        let mut annotator = Annotator::new();

        let marker = annotator.annotate(&mut tree, text, &entry("g1"), Section::Nav).unwrap();

        assert_eq!(tree.children(span), &[marker, text]);
        assert_eq!(tree.attr(marker, "data-entry-id"), Some("g1"));
        assert_eq!(tree.attr(marker, "class"), Some(MARKER_CLASS));
        assert!(tree.attr(span, "style").unwrap().contains("padding-left"));
        assert_eq!(annotator.marker_count(), 1);
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let mut tree = HostTree::new();
        let (span, text) = label(&mut tree);
        let mut annotator = Annotator::new();

        let first = annotator.annotate(&mut tree, text, &entry("g1"), Section::Nav).unwrap();
        let second = annotator.annotate(&mut tree, text, &entry("g1"), Section::Nav).unwrap();

        assert_eq!(first, second);
        assert_eq!(annotator.marker_count(), 1);
        assert_eq!(tree.children(span).len(), 2);
    }

    #[test]
    fn test_annotate_detached_node_fails_without_marker() {
        let mut tree = HostTree::new();
        let (span, text) = label(&mut tree);
        tree.remove(span).unwrap();
        let mut annotator = Annotator::new();

        assert!(annotator.annotate(&mut tree, text, &entry("g1"), Section::Nav).is_err());
        assert_eq!(annotator.marker_count(), 0);
    }

    #[test]
    fn test_remove_all_leaves_no_residue() {
        let mut tree = HostTree::new();
        let (span, text) = label(&mut tree);
        tree.set_attr(span, "style", "color:red");
        tree.take_mutations();
        let mut annotator = Annotator::new();

        let marker = annotator.annotate(&mut tree, text, &entry("g1"), Section::Nav).unwrap();
        annotator.remove_all(&mut tree);

        assert!(tree.is_detached(marker));
        assert_eq!(tree.attr(span, "style"), Some("color:red"));
        assert_eq!(tree.attr(span, ANNOTATED_ATTR), None);
        assert_eq!(annotator.marker_count(), 0);
        // a later annotate starts clean
        assert!(!annotator.processed.is_processed(text));
    }

    #[test]
    fn test_remove_all_restores_styleless_parent() {
        let mut tree = HostTree::new();
        let (span, text) = label(&mut tree);
        let mut annotator = Annotator::new();

        annotator.annotate(&mut tree, text, &entry("g1"), Section::Nav).unwrap();
        annotator.remove_all(&mut tree);
        assert_eq!(tree.attr(span, "style"), None);
    }

    #[test]
    fn test_remove_all_unwinds_shared_parent() {
        let mut tree = HostTree::new();
        let span = tree.append_element(tree.root(), "span");
        let first = tree.append_text(span, "Deal");
        let second = tree.append_text(span, "Company");
        let mut annotator = Annotator::new();

        annotator.annotate(&mut tree, first, &entry("g1"), Section::Nav).unwrap();
        annotator.annotate(&mut tree, second, &entry("g2"), Section::Nav).unwrap();
        annotator.remove_all(&mut tree);

        assert_eq!(tree.attr(span, "style"), None);
        assert_eq!(tree.children(span), &[first, second]);
    }

    #[test]
    fn test_processed_index_generations() {
        let mut index = ProcessedIndex::new();
        let node = {
            let mut tree = HostTree::new();
            let (_, text) = label(&mut tree);
            text
        };

        index.mark(node);
        assert!(index.is_processed(node));

        index.reset();
        assert!(!index.is_processed(node), "stale generation stamps do not count");

        index.mark(node);
        assert!(index.is_processed(node));
        index.clear();
        assert!(!index.is_processed(node));
    }
}
