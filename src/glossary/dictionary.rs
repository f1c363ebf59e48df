//! TermDictionary - Indexed view of glossary entries
//!
//! Builds a normalized-trigger -> entry map plus a length-ordered trigger
//! list from hydrated entries, and memoizes the build behind an externally
//! supplied monotonic version stamp. The dictionary is rebuilt wholesale on
//! invalidation; a pass only ever sees a complete build.

use std::collections::HashMap;
use std::rc::Rc;

use crate::glossary::entry::GlossaryEntry;
use crate::glossary::normalize::TextNormalizer;

// =============================================================================
// TermDictionary
// =============================================================================

/// Immutable, indexed dictionary for one or more passes.
pub struct TermDictionary {
    /// Normalized trigger -> entry. Keys are unique; on collision across
    /// entries the later enabled entry wins.
    map: HashMap<String, Rc<GlossaryEntry>>,
    /// Triggers sorted by character length descending, insertion order
    /// breaking ties. Built once, reused for every lookup pass.
    ordered: Vec<String>,
    /// Entries dropped because no usable trigger survived normalization.
    skipped: usize,
}

impl TermDictionary {
    /// Build from hydrated entries. Disabled entries never contribute keys.
    pub fn build(entries: &[Rc<GlossaryEntry>], normalizer: &TextNormalizer) -> Self {
        let mut map: HashMap<String, Rc<GlossaryEntry>> = HashMap::new();
        let mut insertion: Vec<String> = Vec::new();
        let mut skipped = 0usize;

        for entry in entries.iter().filter(|e| e.enabled) {
            let mut usable = false;
            for raw in entry.matchable_strings() {
                let key = normalizer.normalize_trigger(raw);
                if key.is_empty() {
                    continue;
                }
                usable = true;
                if !map.contains_key(&key) {
                    insertion.push(key.clone());
                }
                // Later entry wins on duplicate keys.
                map.insert(key, Rc::clone(entry));
            }
            if !usable {
                skipped += 1;
            }
        }

        // char-length descending; stable sort preserves insertion order on ties
        let mut ordered = insertion;
        ordered.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

        Self { map, ordered, skipped }
    }

    pub fn get(&self, key: &str) -> Option<&Rc<GlossaryEntry>> {
        self.map.get(key)
    }

    /// Triggers, longest first.
    pub fn ordered_triggers(&self) -> &[String] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries skipped during build for lack of a usable trigger.
    pub fn skipped_entries(&self) -> usize {
        self.skipped
    }
}

// =============================================================================
// DictionaryCache
// =============================================================================

/// Two-tier dictionary cache.
///
/// The authoritative version stamp comes from the external store; the
/// process-local memoized dictionary is reused across passes until the
/// stamp increases or `invalidate` is called. A non-increasing stamp is
/// treated as "no change" and skips the rebuild.
pub struct DictionaryCache {
    version: Option<u64>,
    dict: Option<Rc<TermDictionary>>,
}

impl Default for DictionaryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryCache {
    pub fn new() -> Self {
        Self { version: None, dict: None }
    }

    /// Serve the memoized dictionary, rebuilding only when `version`
    /// exceeds the cached stamp (or nothing is cached yet).
    pub fn ensure(
        &mut self,
        version: u64,
        entries: &[Rc<GlossaryEntry>],
        normalizer: &TextNormalizer,
    ) -> Rc<TermDictionary> {
        if let (Some(dict), Some(cached)) = (&self.dict, self.version) {
            // Non-increasing stamp: no change, serve the memoized copy.
            if version <= cached {
                return Rc::clone(dict);
            }
        }

        let dict = Rc::new(TermDictionary::build(entries, normalizer));
        self.version = Some(version.max(self.version.unwrap_or(0)));
        self.dict = Some(Rc::clone(&dict));
        dict
    }

    /// Drop the memoized copy; the next `ensure` rebuilds regardless of stamp.
    pub fn invalidate(&mut self) {
        self.version = None;
        self.dict = None;
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn is_built(&self) -> bool {
        self.dict.is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::entry::EntryMetadata;

    fn entry(id: &str, trigger: &str, aliases: &[&str], enabled: bool) -> Rc<GlossaryEntry> {
        Rc::new(GlossaryEntry {
            id: id.to_string(),
            title: trigger.to_string(),
            trigger: trigger.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            definition_html: String::new(),
            enabled,
            metadata: EntryMetadata::default(),
        })
    }

    #[test]
    fn test_disabled_entries_excluded() {
        let norm = TextNormalizer::new();
        let entries = vec![
            entry("g1", "deal", &[], true),
            entry("g2", "company", &["org"], false),
        ];
        let dict = TermDictionary::build(&entries, &norm);

        assert!(dict.get("deal").is_some());
        assert!(dict.get("company").is_none());
        assert!(dict.get("org").is_none());
    }

    #[test]
    fn test_aliases_map_to_same_entry() {
        let norm = TextNormalizer::new();
        let entries = vec![entry("g1", "company", &["org", "Account"], true)];
        let dict = TermDictionary::build(&entries, &norm);

        assert_eq!(dict.get("company").unwrap().id, "g1");
        assert_eq!(dict.get("org").unwrap().id, "g1");
        assert_eq!(dict.get("account").unwrap().id, "g1");
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn test_duplicate_key_last_entry_wins() {
        let norm = TextNormalizer::new();
        let entries = vec![
            entry("g1", "deal", &[], true),
            entry("g2", "Deal", &[], true),
        ];
        let dict = TermDictionary::build(&entries, &norm);

        assert_eq!(dict.get("deal").unwrap().id, "g2");
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_empty_trigger_entry_skipped() {
        let norm = TextNormalizer::new();
        let entries = vec![
            entry("g1", "  \u{200B} ", &[], true),
            entry("g2", "deal", &[], true),
        ];
        let dict = TermDictionary::build(&entries, &norm);

        assert_eq!(dict.len(), 1);
        assert_eq!(dict.skipped_entries(), 1);
    }

    #[test]
    fn test_entry_with_empty_trigger_but_usable_alias() {
        let norm = TextNormalizer::new();
        let entries = vec![entry("g1", "", &["pipeline"], true)];
        let dict = TermDictionary::build(&entries, &norm);

        assert_eq!(dict.skipped_entries(), 0);
        assert_eq!(dict.get("pipeline").unwrap().id, "g1");
    }

    #[test]
    fn test_ordered_longest_first_ties_by_insertion() {
        let norm = TextNormalizer::new();
        let entries = vec![
            entry("g1", "deal", &[], true),
            entry("g2", "deal stage", &[], true),
            entry("g3", "note", &[], true),
        ];
        let dict = TermDictionary::build(&entries, &norm);

        assert_eq!(dict.ordered_triggers(), &["deal stage", "deal", "note"]);
    }

    #[test]
    fn test_cache_reuses_same_build_for_same_version() {
        let norm = TextNormalizer::new();
        let entries = vec![entry("g1", "deal", &[], true)];
        let mut cache = DictionaryCache::new();

        let first = cache.ensure(3, &entries, &norm);
        let second = cache.ensure(3, &entries, &norm);
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_skips_non_increasing_version() {
        let norm = TextNormalizer::new();
        let v3 = vec![entry("g1", "deal", &[], true)];
        let v2 = vec![entry("g1", "company", &[], true)];
        let mut cache = DictionaryCache::new();

        cache.ensure(3, &v3, &norm);
        // Stale replay with a lower stamp must not clobber the cache
        let dict = cache.ensure(2, &v2, &norm);
        assert!(dict.get("deal").is_some());
        assert!(dict.get("company").is_none());
        assert_eq!(cache.version(), Some(3));
    }

    #[test]
    fn test_cache_rebuilds_on_higher_version() {
        let norm = TextNormalizer::new();
        let v1 = vec![entry("g1", "deal", &[], true)];
        let v2 = vec![entry("g1", "deal", &[], true), entry("g2", "company", &[], true)];
        let mut cache = DictionaryCache::new();

        cache.ensure(1, &v1, &norm);
        let dict = cache.ensure(2, &v2, &norm);
        assert!(dict.get("company").is_some());
        assert_eq!(cache.version(), Some(2));
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let norm = TextNormalizer::new();
        let entries = vec![entry("g1", "deal", &[], true)];
        let mut cache = DictionaryCache::new();

        let first = cache.ensure(5, &entries, &norm);
        cache.invalidate();
        assert!(!cache.is_built());
        // Same stamp, but invalidation forces a fresh build
        let second = cache.ensure(5, &entries, &norm);
        assert!(!Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_build_matches_direct_build() {
        let norm = TextNormalizer::new();
        let entries = vec![
            entry("g1", "deal", &[], true),
            entry("g2", "deal stage", &["stage"], true),
        ];
        let direct = TermDictionary::build(&entries, &norm);
        let mut cache = DictionaryCache::new();
        let cached = cache.ensure(1, &entries, &norm);

        assert_eq!(direct.len(), cached.len());
        assert_eq!(direct.ordered_triggers(), cached.ordered_triggers());
        for key in direct.ordered_triggers() {
            assert_eq!(direct.get(key).unwrap().id, cached.get(key).unwrap().id);
        }
    }
}
