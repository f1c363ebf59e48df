//! SectionResolver - Coarse page-region classification
//!
//! Dedup scope is the page region, not the whole page, so two occurrences
//! of the same term in different panes each get a marker. Regions come from
//! structural fingerprints on ancestors (landmark roles, a few tags, class
//! hints). The fingerprints are host-UI specific and drift as the host's
//! markup changes, so they live in a rule table handed to the resolver,
//! not in resolver logic.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::tree::{HostTree, NodeId};

// =============================================================================
// Section
// =============================================================================

/// Closed set of page regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    SidebarLeft,
    SidebarRight,
    Header,
    Middle,
    Modal,
    Dropdown,
    FilterPanel,
    Nav,
    Table,
    MainFallback,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::SidebarLeft => "sidebar-left",
            Section::SidebarRight => "sidebar-right",
            Section::Header => "header",
            Section::Middle => "middle",
            Section::Modal => "modal",
            Section::Dropdown => "dropdown",
            Section::FilterPanel => "filter-panel",
            Section::Nav => "nav",
            Section::Table => "table",
            Section::MainFallback => "main-fallback",
        }
    }
}

// =============================================================================
// Rule table
// =============================================================================

/// One structural fingerprint. Rule order is priority order: when several
/// rules hit the same ancestor, the earliest rule in the table wins.
#[derive(Debug, Clone)]
pub struct SectionRule {
    pub section: Section,
    /// Element tags that identify the region outright.
    pub tags: Vec<String>,
    /// ARIA-style `role` attribute values.
    pub roles: Vec<String>,
    /// Substrings matched anywhere inside the `class` attribute.
    pub class_hints: Vec<String>,
}

impl SectionRule {
    fn new(section: Section, tags: &[&str], roles: &[&str], class_hints: &[&str]) -> Self {
        Self {
            section,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            class_hints: class_hints.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Default fingerprints. Overlays (modal, dropdown) come first because
/// they nest inside the regions listed after them.
pub fn default_rules() -> Vec<SectionRule> {
    vec![
        SectionRule::new(
            Section::Modal,
            &["dialog"],
            &["dialog", "alertdialog"],
            &["modal", "overlay-panel"],
        ),
        SectionRule::new(
            Section::Dropdown,
            &[],
            &["menu", "listbox", "combobox"],
            &["dropdown", "select-menu"],
        ),
        SectionRule::new(
            Section::FilterPanel,
            &[],
            &[],
            &["filter-panel", "filter-bar", "facet"],
        ),
        SectionRule::new(
            Section::SidebarLeft,
            &[],
            &[],
            &["sidebar-left", "left-sidebar", "side-nav-left"],
        ),
        SectionRule::new(
            Section::SidebarRight,
            &[],
            &[],
            &["sidebar-right", "right-sidebar", "side-nav-right"],
        ),
        SectionRule::new(Section::Nav, &["nav"], &["navigation"], &[]),
        SectionRule::new(Section::Header, &["header"], &["banner"], &["page-header"]),
        SectionRule::new(
            Section::Table,
            &["table", "thead", "tbody", "tr", "th", "td"],
            &["grid", "table"],
            &[],
        ),
        SectionRule::new(
            Section::Middle,
            &["main"],
            &["main"],
            &["middle-pane", "center-pane", "main-column"],
        ),
    ]
}

// =============================================================================
// SectionResolver
// =============================================================================

pub struct SectionResolver {
    rules: Vec<SectionRule>,
    tag_rule: HashMap<String, usize>,
    role_rule: HashMap<String, usize>,
    /// Pattern index -> rule index for the class-hint automaton.
    hint_rule: Vec<usize>,
    hints: AhoCorasick,
}

impl Default for SectionResolver {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl SectionResolver {
    pub fn new(rules: Vec<SectionRule>) -> Self {
        let mut tag_rule = HashMap::new();
        let mut role_rule = HashMap::new();
        let mut hint_rule = Vec::new();
        let mut patterns: Vec<String> = Vec::new();

        for (idx, rule) in rules.iter().enumerate() {
            for tag in &rule.tags {
                tag_rule.entry(tag.to_lowercase()).or_insert(idx);
            }
            for role in &rule.roles {
                role_rule.entry(role.to_lowercase()).or_insert(idx);
            }
            for hint in &rule.class_hints {
                patterns.push(hint.to_lowercase());
                hint_rule.push(idx);
            }
        }

        // Containment scan over class strings; overlapping hits all count
        let hints = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(true)
            .build(&patterns)
            .expect("section hint patterns are a small fixed set");

        Self { rules, tag_rule, role_rule, hint_rule, hints }
    }

    /// Classify the region a node sits in. Walks ancestors once; per
    /// ancestor the earliest matching rule wins; defaults to MainFallback.
    pub fn resolve(&self, tree: &HostTree, node: NodeId) -> Section {
        for ancestor in tree.ancestors_inclusive(node) {
            if let Some(idx) = self.match_element(tree, ancestor) {
                return self.rules[idx].section;
            }
        }
        Section::MainFallback
    }

    fn match_element(&self, tree: &HostTree, node: NodeId) -> Option<usize> {
        let tag = tree.tag(node)?;
        let mut best: Option<usize> = None;

        if let Some(idx) = self.tag_rule.get(&tag.to_lowercase()) {
            best = Some(*idx);
        }
        if let Some(role) = tree.attr(node, "role") {
            if let Some(idx) = self.role_rule.get(&role.to_lowercase()) {
                best = Some(best.map_or(*idx, |b| b.min(*idx)));
            }
        }
        if let Some(class) = tree.attr(node, "class") {
            for m in self.hints.find_overlapping_iter(class) {
                let idx = self.hint_rule[m.pattern().as_usize()];
                best = Some(best.map_or(idx, |b| b.min(idx)));
            }
        }

        best
    }
}

// =============================================================================
// Tests
// =============================================================================
