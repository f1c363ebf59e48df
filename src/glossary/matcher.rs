//! Whole-label matcher with pluralization fallback
//!
//! Compares normalized label text against the dictionary's triggers,
//! longest trigger first, so the most specific term wins whenever one
//! trigger is a prefix of another. Only whole-string equality (exact or
//! pluralized) is ever accepted - substring containment would let a short,
//! unrelated term fire inside a longer label, which is exactly the bug
//! this matcher exists to rule out.

use std::rc::Rc;

use crate::glossary::dictionary::TermDictionary;
use crate::glossary::entry::GlossaryEntry;

// =============================================================================
// Types
// =============================================================================

/// Which rule accepted the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Label equals the trigger.
    Exact,
    /// Label is trigger + "s".
    PluralS,
    /// Label is trigger + "es".
    PluralEs,
    /// Trigger ends in "y", label is stem + "ies".
    PluralIes,
    /// Singularizing one side yields the other (plural trigger, singular
    /// label, or a plural label form rules 2-4 missed).
    Singularized,
}

/// A successful dictionary match.
pub struct TermMatch<'d> {
    pub entry: &'d Rc<GlossaryEntry>,
    pub trigger: &'d str,
    pub rule: MatchRule,
}

// =============================================================================
// Matching
// =============================================================================

/// Test one trigger against normalized label text.
///
/// Rules are checked in order; first success wins.
pub fn trigger_matches(trigger: &str, text: &str) -> Option<MatchRule> {
    if trigger.is_empty() || text.is_empty() {
        return None;
    }

    if text == trigger {
        return Some(MatchRule::Exact);
    }

    if strip_prefixed(text, trigger) == Some("s") {
        return Some(MatchRule::PluralS);
    }

    if strip_prefixed(text, trigger) == Some("es") {
        return Some(MatchRule::PluralEs);
    }

    if let Some(stem) = trigger.strip_suffix('y') {
        if text.len() == stem.len() + 3 && text.starts_with(stem) && text.ends_with("ies") {
            return Some(MatchRule::PluralIes);
        }
    }

    if singular_forms(text).iter().any(|t| t == trigger)
        || singular_forms(trigger).iter().any(|t| t == text)
    {
        return Some(MatchRule::Singularized);
    }

    None
}

/// Find the first (longest-trigger) entry matching the label.
pub fn find_match<'d>(dict: &'d TermDictionary, normalized_text: &str) -> Option<TermMatch<'d>> {
    if normalized_text.is_empty() {
        return None;
    }

    for trigger in dict.ordered_triggers() {
        if let Some(rule) = trigger_matches(trigger, normalized_text) {
            let entry = dict.get(trigger)?;
            return Some(TermMatch { entry, trigger, rule });
        }
    }

    None
}

/// The remainder of `text` after `trigger`, if trigger is a proper prefix.
fn strip_prefixed<'a>(text: &'a str, trigger: &str) -> Option<&'a str> {
    text.strip_prefix(trigger).filter(|rest| !rest.is_empty())
}

/// Candidate singular forms of a word: "ies" -> "y", then bare "es"/"s"
/// suffix removal. Longest suffix first.
fn singular_forms(word: &str) -> Vec<String> {
    let mut forms = Vec::new();
    if let Some(stem) = word.strip_suffix("ies") {
        forms.push(format!("{}y", stem));
    }
    if let Some(stem) = word.strip_suffix("es") {
        forms.push(stem.to_string());
    }
    if let Some(stem) = word.strip_suffix('s') {
        forms.push(stem.to_string());
    }
    forms
}

// =============================================================================
// Tests
// =============================================================================
