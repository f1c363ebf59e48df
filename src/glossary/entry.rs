//! GlossaryEntry - Hydration model for glossary terms
//!
//! Entries are owned by the external glossary store and delivered as a
//! full-replace JSON array with a version stamp. The engine references
//! entries (behind `Rc`), it never edits them.

use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// Optional routing/presentation metadata carried on each entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "objectFilter")]
    pub object_filter: Option<String>,
    #[serde(default, rename = "groupFilter")]
    pub group_filter: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// A single glossary entry as delivered by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub id: String,
    pub title: String,
    /// Primary matchable string.
    pub trigger: String,
    /// Additional matchable strings, in author order.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, rename = "definitionHtml")]
    pub definition_html: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub metadata: EntryMetadata,
}

fn default_enabled() -> bool {
    true
}

impl GlossaryEntry {
    /// Trigger plus aliases, in the order keys are derived from them.
    pub fn matchable_strings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.trigger.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_parsing_with_defaults() {
        let json = r#"{"id": "g1", "title": "Deal", "trigger": "deal"}"#;
        let entry: GlossaryEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.id, "g1");
        assert!(entry.enabled);
        assert!(entry.aliases.is_empty());
        assert!(entry.metadata.category.is_none());
    }

    #[test]
    fn test_entry_parsing_full() {
        let json = r#"{
            "id": "g2",
            "title": "Deal Stage",
            "trigger": "deal stage",
            "aliases": ["stage", "pipeline stage"],
            "definitionHtml": "<p>A step in the pipeline.</p>",
            "enabled": false,
            "metadata": {"category": "sales", "objectFilter": "deals", "link": "https://example.test/deal-stage"}
        }"#;
        let entry: GlossaryEntry = serde_json::from_str(json).unwrap();

        assert!(!entry.enabled);
        assert_eq!(entry.aliases.len(), 2);
        assert_eq!(entry.metadata.category.as_deref(), Some("sales"));
        assert_eq!(entry.metadata.object_filter.as_deref(), Some("deals"));
    }

    #[test]
    fn test_matchable_order() {
        let entry = GlossaryEntry {
            id: "g1".into(),
            title: "Company".into(),
            trigger: "company".into(),
            aliases: vec!["org".into(), "account".into()],
            definition_html: String::new(),
            enabled: true,
            metadata: EntryMetadata::default(),
        };
        let strings: Vec<&str> = entry.matchable_strings().collect();
        assert_eq!(strings, vec!["company", "org", "account"]);
    }
}
