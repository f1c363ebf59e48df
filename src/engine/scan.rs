//! TreeScanner - Candidate text-node discovery
//!
//! Lazy depth-first walk over the host tree yielding text nodes that look
//! like annotatable labels. The walk always roots at the tree root, never
//! at a narrow container: hosts routinely render dynamic content as a
//! *sibling* of the element that triggered it, so scanning only the
//! triggering subtree would miss it.
//!
//! The filter chain is ordered cheapest-first and prunes whole subtrees
//! where it can, which is what bounds cost on prose-heavy pages.

use unicode_segmentation::UnicodeSegmentation;

use crate::engine::config::ScanConfig;
use crate::engine::tree::{HostTree, NodeId};
use crate::glossary::normalize::TextNormalizer;

// =============================================================================
// Constants
// =============================================================================

/// Subtrees that never produce rendered label text.
const NONVISUAL_TAGS: [&str; 6] = ["script", "style", "template", "noscript", "svg", "iframe"];

/// Cheap pre-normalization length gate, in bytes. Anything this far over
/// the label bound is prose and gets rejected before allocating.
const RAW_LENGTH_SLACK: usize = 4;

// =============================================================================
// Types
// =============================================================================

/// A text node that survived filtering, with its label normalization
/// computed exactly once for the pass.
#[derive(Debug, Clone)]
pub struct ScanCandidate {
    pub node: NodeId,
    pub normalized: String,
}

// =============================================================================
// TreeScanner
// =============================================================================

/// Single-use, finite iterator over scan candidates. A new pass builds a
/// new scanner; there is no mid-walk restart.
pub struct TreeScanner<'p> {
    tree: &'p HostTree,
    normalizer: &'p TextNormalizer,
    config: &'p ScanConfig,
    stack: Vec<NodeId>,
}

impl<'p> TreeScanner<'p> {
    pub fn new(tree: &'p HostTree, normalizer: &'p TextNormalizer, config: &'p ScanConfig) -> Self {
        Self {
            tree,
            normalizer,
            config,
            stack: vec![tree.root()],
        }
    }

    /// Subtree-level pruning for elements.
    fn prune_element(&self, node: NodeId) -> bool {
        if self.tree.is_hidden(node) {
            return true;
        }
        if self.tree.is_marker(node) || self.tree.is_panel(node) {
            return true;
        }
        match self.tree.tag(node) {
            Some(tag) => NONVISUAL_TAGS.contains(&tag.to_lowercase().as_str()),
            None => false,
        }
    }

    /// Tag-context policy: deny wins, then a non-empty allowlist must
    /// contain the parent tag.
    fn tag_allowed(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        if self.config.deny_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            return false;
        }
        if self.config.allow_tags.is_empty() {
            return true;
        }
        self.config.allow_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag))
    }

    /// Full per-text-node evaluation. None = filtered out.
    fn evaluate_text(&self, node: NodeId) -> Option<ScanCandidate> {
        let raw = self.tree.text(node)?;
        if raw.len() > self.config.max_label_chars * RAW_LENGTH_SLACK {
            return None;
        }

        let parent = self.tree.parent(node)?;
        // nearest element ancestor already produced by us -> never rescan
        if self.tree.is_marker(parent) || self.tree.is_panel(parent) {
            return None;
        }
        let tag = self.tree.tag(parent)?;
        if !self.tag_allowed(tag) {
            return None;
        }

        let normalized = self.normalizer.normalize_label(raw);
        if normalized.is_empty() {
            return None;
        }
        if normalized.chars().count() > self.config.max_label_chars {
            return None;
        }
        if normalized.unicode_words().count() > self.config.max_label_words {
            return None;
        }

        Some(ScanCandidate { node, normalized })
    }
}

impl<'p> Iterator for TreeScanner<'p> {
    type Item = ScanCandidate;

    fn next(&mut self) -> Option<ScanCandidate> {
        while let Some(node) = self.stack.pop() {
            if self.tree.is_text(node) {
                if let Some(candidate) = self.evaluate_text(node) {
                    return Some(candidate);
                }
                continue;
            }
            if self.prune_element(node) {
                continue;
            }
            for child in self.tree.children(node).iter().rev() {
                self.stack.push(*child);
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
