//! EngineConfig - Per-pass configuration
//!
//! Read by the engine at the start of every pass, never cached across a
//! change: flipping a toggle takes effect on the next pass without a
//! navigation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::section::Section;

// =============================================================================
// Defaults
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_allow_tags() -> Vec<String> {
    [
        "span", "label", "a", "button", "th", "td", "li", "dt", "dd", "legend", "summary",
        "h1", "h2", "h3", "h4", "h5", "h6",
        // host-declared i18n label wrappers
        "i18n-string",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_label_chars() -> usize {
    80
}

fn default_max_label_words() -> usize {
    6
}

fn default_debounce_ms() -> f64 {
    200.0
}

fn default_min_pass_interval_ms() -> f64 {
    250.0
}

fn default_second_pass_delay_ms() -> f64 {
    500.0
}

fn default_third_pass_delay_ms() -> f64 {
    2500.0
}

// =============================================================================
// Types
// =============================================================================

/// Bounds on which text nodes count as annotatable labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// Parent tags a candidate text node may sit under. Empty = any.
    #[serde(default = "default_allow_tags")]
    pub allow_tags: Vec<String>,
    /// Parent tags that are never candidates; overrides the allowlist.
    #[serde(default)]
    pub deny_tags: Vec<String>,
    #[serde(default = "default_max_label_chars")]
    pub max_label_chars: usize,
    #[serde(default = "default_max_label_words")]
    pub max_label_words: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            allow_tags: default_allow_tags(),
            deny_tags: Vec::new(),
            max_label_chars: default_max_label_chars(),
            max_label_words: default_max_label_words(),
        }
    }
}

/// Pass-cadence tuning. All values are host-clock milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Quiet window a mutation burst must close before a pass runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: f64,
    /// Floor between consecutive mutation-triggered passes.
    #[serde(default = "default_min_pass_interval_ms")]
    pub min_pass_interval_ms: f64,
    /// Delay of the conditional second pass after a view load.
    #[serde(default = "default_second_pass_delay_ms")]
    pub second_pass_delay_ms: f64,
    /// Delay of the conditional third pass after a view load.
    #[serde(default = "default_third_pass_delay_ms")]
    pub third_pass_delay_ms: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_pass_interval_ms: default_min_pass_interval_ms(),
            second_pass_delay_ms: default_second_pass_delay_ms(),
            third_pass_delay_ms: default_third_pass_delay_ms(),
        }
    }
}

/// Engine configuration as delivered by the settings collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Master switch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Release gate; both this and `enabled` must hold for a pass to run.
    #[serde(default = "default_true")]
    pub feature_toggle: bool,
    /// Per-section suppression, keyed by section name ("sidebar-left", ...).
    /// A section mapped to `false` gets no markers.
    #[serde(default)]
    pub section_overrides: HashMap<String, bool>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feature_toggle: true,
            section_overrides: HashMap::new(),
            scan: ScanConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Both switches on?
    pub fn is_active(&self) -> bool {
        self.enabled && self.feature_toggle
    }

    /// Section allowed (unlisted sections default to on)?
    pub fn section_allowed(&self, section: Section) -> bool {
        self.section_overrides
            .get(section.as_str())
            .copied()
            .unwrap_or(true)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.enabled);
        assert!(config.feature_toggle);
        assert!(config.is_active());
        assert!(config.scan.allow_tags.contains(&"span".to_string()));
        assert_eq!(config.scan.max_label_words, 6);
    }

    #[test]
    fn test_parse_partial_json() {
        let json = r#"{"featureToggle": false, "scan": {"maxLabelChars": 40}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert!(config.enabled);
        assert!(!config.feature_toggle);
        assert!(!config.is_active());
        assert_eq!(config.scan.max_label_chars, 40);
        // untouched fields keep their defaults
        assert_eq!(config.scan.max_label_words, 6);
        assert_eq!(config.schedule.debounce_ms, 200.0);
    }

    #[test]
    fn test_section_overrides() {
        let json = r#"{"sectionOverrides": {"nav": false}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert!(!config.section_allowed(Section::Nav));
        assert!(config.section_allowed(Section::Table));
    }
}
