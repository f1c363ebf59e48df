//! PopupState - The single open definition popup
//!
//! A 2-state machine with one process-wide state variable: either no popup
//! is open, or exactly one is. Semantic state is the source of truth; the
//! panel node in the tree is derived from it, never inspected to decide
//! transitions.
//!
//! Outside interactions dismiss the popup, but only once the popup has
//! been open for a minimum arming delay - otherwise the very interaction
//! that opened it would immediately close it again as it finishes
//! propagating through the host.

use crate::engine::tree::{HostTree, NodeId, PANEL_TAG};
use crate::glossary::entry::GlossaryEntry;

// =============================================================================
// Constants
// =============================================================================

/// Minimum open time (host-clock ms) before outside interactions are
/// honored. Empirically required for reliable dismissal; tune here, not
/// at call sites.
pub const OUTSIDE_DISMISS_ARM_MS: f64 = 100.0;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone)]
struct OpenPopup {
    entry_id: String,
    marker: NodeId,
    panel: NodeId,
    opened_at_ms: f64,
}

/// What an activation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupTransition {
    /// closed -> open
    Opened,
    /// open -> closed, same marker activated again
    Toggled,
    /// open(A) -> open(B): close-then-open, never two open popups
    Switched { previous_entry: String },
}

// =============================================================================
// PopupState
// =============================================================================

#[derive(Debug, Default)]
pub struct PopupState {
    open: Option<OpenPopup>,
}

impl PopupState {
    pub fn new() -> Self {
        Self { open: None }
    }

    pub fn open_entry_id(&self) -> Option<&str> {
        self.open.as_ref().map(|o| o.entry_id.as_str())
    }

    pub fn panel(&self) -> Option<NodeId> {
        self.open.as_ref().map(|o| o.panel)
    }

    /// A marker was activated.
    pub fn activate(
        &mut self,
        tree: &mut HostTree,
        marker: NodeId,
        entry: &GlossaryEntry,
        now_ms: f64,
    ) -> PopupTransition {
        match self.open.take() {
            Some(open) if open.marker == marker => {
                self.remove_panel(tree, open.panel);
                PopupTransition::Toggled
            }
            Some(open) => {
                self.remove_panel(tree, open.panel);
                self.insert_panel(tree, marker, entry, now_ms);
                PopupTransition::Switched { previous_entry: open.entry_id }
            }
            None => {
                self.insert_panel(tree, marker, entry, now_ms);
                PopupTransition::Opened
            }
        }
    }

    /// An interaction landed somewhere in the tree. Closes the popup only
    /// when the target is outside both the open marker and the panel -
    /// ancestor-inclusive, so a node nested arbitrarily deep inside either
    /// region still counts as inside. Returns true if the popup closed.
    pub fn pointer_down(&mut self, tree: &mut HostTree, target: NodeId, now_ms: f64) -> bool {
        let Some(open) = &self.open else {
            return false;
        };
        if now_ms - open.opened_at_ms < OUTSIDE_DISMISS_ARM_MS {
            return false;
        }
        if tree.contains(open.marker, target) || tree.contains(open.panel, target) {
            return false;
        }
        let open = self.open.take();
        if let Some(open) = open {
            self.remove_panel(tree, open.panel);
        }
        true
    }

    /// Force-close without an interaction (teardown path).
    pub fn close(&mut self, tree: &mut HostTree) {
        if let Some(open) = self.open.take() {
            self.remove_panel(tree, open.panel);
        }
    }

    fn insert_panel(&mut self, tree: &mut HostTree, marker: NodeId, entry: &GlossaryEntry, now_ms: f64) {
        let panel = tree.append_element(tree.root(), PANEL_TAG);
        tree.set_attr(panel, "data-entry-id", &entry.id);
        tree.append_text(panel, &entry.definition_html);
        self.open = Some(OpenPopup {
            entry_id: entry.id.clone(),
            marker,
            panel,
            opened_at_ms: now_ms,
        });
    }

    fn remove_panel(&self, tree: &mut HostTree, panel: NodeId) {
        // A panel the host already tore out is fine; removal is idempotent
        let _ = tree.remove(panel);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tree::MARKER_TAG;
    use crate::glossary::entry::EntryMetadata;

    fn entry(id: &str) -> GlossaryEntry {
        GlossaryEntry {
            id: id.to_string(),
            title: id.to_string(),
            trigger: id.to_string(),
            aliases: vec![],
            definition_html: format!("definition of {}", id),
            enabled: true,
            metadata: EntryMetadata::default(),
        }
    }

    fn marker(tree: &mut HostTree) -> NodeId {
        let span = tree.append_element(tree.root(), "span");
        let text = tree.append_text(span, "Deals");
        tree.insert_element_before(text, MARKER_TAG).unwrap()
    }

    #[test]
    fn test_open_then_toggle_off() {
        let mut tree = HostTree::new();
        let m = marker(&mut tree);
        let e = entry("g1");
        let mut popup = PopupState::new();

        assert_eq!(popup.activate(&mut tree, m, &e, 0.0), PopupTransition::Opened);
        assert_eq!(popup.open_entry_id(), Some("g1"));
        let panel = popup.panel().unwrap();
        assert!(tree.is_panel(panel));

        assert_eq!(popup.activate(&mut tree, m, &e, 50.0), PopupTransition::Toggled);
        assert_eq!(popup.open_entry_id(), None);
        assert!(tree.is_detached(panel));
    }

    #[test]
    fn test_switch_closes_then_opens() {
        let mut tree = HostTree::new();
        let a = marker(&mut tree);
        let b = marker(&mut tree);
        let mut popup = PopupState::new();

        popup.activate(&mut tree, a, &entry("g1"), 0.0);
        let first_panel = popup.panel().unwrap();

        let t = popup.activate(&mut tree, b, &entry("g2"), 10.0);
        assert_eq!(t, PopupTransition::Switched { previous_entry: "g1".to_string() });
        assert_eq!(popup.open_entry_id(), Some("g2"));
        assert!(tree.is_detached(first_panel), "never two open panels");
    }

    #[test]
    fn test_outside_pointer_closes_after_arming() {
        let mut tree = HostTree::new();
        let m = marker(&mut tree);
        let outside = tree.append_element(tree.root(), "div");
        let mut popup = PopupState::new();

        popup.activate(&mut tree, m, &entry("g1"), 1000.0);

        // inside the arming window: the opening click must not dismiss
        assert!(!popup.pointer_down(&mut tree, outside, 1000.0 + OUTSIDE_DISMISS_ARM_MS - 1.0));
        assert_eq!(popup.open_entry_id(), Some("g1"));

        assert!(popup.pointer_down(&mut tree, outside, 1000.0 + OUTSIDE_DISMISS_ARM_MS));
        assert_eq!(popup.open_entry_id(), None);
    }

    #[test]
    fn test_pointer_inside_marker_or_panel_keeps_popup() {
        let mut tree = HostTree::new();
        let m = marker(&mut tree);
        let marker_child = tree.append_element(m, "span");
        let mut popup = PopupState::new();

        popup.activate(&mut tree, m, &entry("g1"), 0.0);
        let panel = popup.panel().unwrap();
        let panel_inner = tree.append_element(panel, "div");
        let panel_deep = tree.append_element(panel_inner, "a");

        // nested targets resolve through ancestors, not identity
        assert!(!popup.pointer_down(&mut tree, marker_child, 500.0));
        assert!(!popup.pointer_down(&mut tree, panel_deep, 500.0));
        assert_eq!(popup.open_entry_id(), Some("g1"));
    }

    #[test]
    fn test_pointer_with_nothing_open_is_noop() {
        let mut tree = HostTree::new();
        let outside = tree.append_element(tree.root(), "div");
        let mut popup = PopupState::new();
        assert!(!popup.pointer_down(&mut tree, outside, 500.0));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut tree = HostTree::new();
        let m = marker(&mut tree);
        let mut popup = PopupState::new();

        popup.activate(&mut tree, m, &entry("g1"), 0.0);
        popup.close(&mut tree);
        popup.close(&mut tree);
        assert_eq!(popup.open_entry_id(), None);
    }
}
