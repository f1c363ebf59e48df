//! AnnotationEngine - Unified coordinator for annotation passes
//!
//! Single entry point tying the subsystems together: glossary cache,
//! scanner, matcher, section resolver, dedup, annotator, scheduler. One
//! `run_pass` call does scan -> match -> classify -> dedup -> annotate
//! over the current tree state, with per-phase timings and per-node
//! failures absorbed into the pass record.
//!
//! # Usage (JavaScript)
//! ```javascript
//! import init, { AnnotationEngine } from 'glosscore';
//!
//! await init();
//! const engine = new AnnotationEngine(null);
//! engine.hydrateGlossary(entriesJson, versionStamp);
//! engine.loadSnapshot(treeJson);
//! // host timer loop:
//! const deadline = engine.nextDeadlineMs();
//! engine.tick();
//! // marker clicks:
//! engine.activateMarker(markerId);
//! for (const event of engine.takeEvents()) { render(event); }
//! ```

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use crate::engine::annotate::Annotator;
use crate::engine::config::EngineConfig;
use crate::engine::popup::PopupTransition;
use crate::engine::scan::TreeScanner;
use crate::engine::schedule::{ChangeScheduler, DuePass};
use crate::engine::section::{Section, SectionResolver};
use crate::engine::tree::{HostTree, NodeId, NodeSnapshot};
use crate::glossary::dictionary::DictionaryCache;
use crate::glossary::entry::GlossaryEntry;
use crate::glossary::matcher::find_match;
use crate::glossary::normalize::TextNormalizer;

// =============================================================================
// Constants
// =============================================================================

/// Class substrings that mark a view as still loading. A view showing any
/// of these gets its conditional follow-up passes.
const LOADING_CLASS_HINTS: [&str; 3] = ["loading", "spinner", "skeleton"];

// =============================================================================
// Types
// =============================================================================

/// Timing breakdown for one pass, in microseconds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PassTimings {
    pub total_us: u64,
    pub dictionary_us: u64,
    pub scan_us: u64,
    pub apply_us: u64,
}

/// Error during one annotation step (non-fatal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassError {
    pub phase: String,
    pub message: String,
}

/// Result record of one pass.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PassStats {
    pub timings: PassTimings,
    /// Tree text fingerprint as hex (u64 overflows JS safe integers).
    pub content_hash: String,
    pub was_skipped: bool,
    pub candidates: usize,
    pub matches: usize,
    pub markers_inserted: usize,
    /// Matches whose node already carried a marker from an earlier pass.
    pub markers_kept: usize,
    pub dedup_suppressed: usize,
    pub section_suppressed: usize,
    pub errors: Vec<PassError>,
}

/// Events consumed by the host renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    MarkerInserted {
        marker: NodeId,
        entry_id: String,
        section: Section,
    },
    #[serde(rename_all = "camelCase")]
    ShowDefinition {
        entry_id: String,
        title: String,
        definition_html: String,
        link: Option<String>,
        category: Option<String>,
    },
    HideDefinition,
}

// =============================================================================
// AnnotationEngine
// =============================================================================

#[wasm_bindgen]
pub struct AnnotationEngine {
    config: EngineConfig,
    normalizer: TextNormalizer,
    entries: Vec<Rc<GlossaryEntry>>,
    entries_version: u64,
    glossary_hydrated: bool,
    cache: DictionaryCache,
    resolver: SectionResolver,
    scheduler: ChangeScheduler,
    annotator: Annotator,
    tree: Option<HostTree>,
    events: Vec<EngineEvent>,
    last_stats: Option<PassStats>,
    last_fingerprint: Option<u64>,
}

impl Default for AnnotationEngine {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl AnnotationEngine {
    pub fn with_config(config: EngineConfig) -> Self {
        let scheduler = ChangeScheduler::new(config.schedule.clone());
        Self {
            config,
            normalizer: TextNormalizer::new(),
            entries: Vec::new(),
            entries_version: 0,
            glossary_hydrated: false,
            cache: DictionaryCache::new(),
            resolver: SectionResolver::default(),
            scheduler,
            annotator: Annotator::new(),
            tree: None,
            events: Vec::new(),
            last_stats: None,
            last_fingerprint: None,
        }
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Full-replace glossary hydration with its store version stamp. A
    /// non-increasing stamp means "no change": entries and cache stay as
    /// they are. An increasing stamp re-annotates the mounted view.
    pub fn hydrate_glossary(&mut self, entries: Vec<GlossaryEntry>, version: u64, now_ms: f64) {
        if self.glossary_hydrated && version <= self.entries_version {
            return;
        }
        self.entries = entries.into_iter().map(Rc::new).collect();
        self.entries_version = version;
        self.glossary_hydrated = true;
        self.last_fingerprint = None;
        if self.tree.is_some() {
            self.run_pass(now_ms);
        }
    }

    /// Replace the live configuration. Takes effect immediately: turning
    /// the engine off strips every marker, turning it on re-annotates,
    /// no navigation required.
    pub fn set_config(&mut self, config: EngineConfig, now_ms: f64) {
        self.scheduler.set_config(config.schedule.clone());
        self.config = config;
        self.last_fingerprint = None;

        if self.config.is_active() {
            if self.tree.is_some() {
                self.run_pass(now_ms);
            }
        } else if let Some(tree) = self.tree.as_mut() {
            if self.annotator.popup.open_entry_id().is_some() {
                self.events.push(EngineEvent::HideDefinition);
            }
            self.annotator.remove_all(tree);
            // our own unwind must not look like host activity
            tree.take_mutations();
        }
    }

    /// Mount a view. Any previous view is torn down first; the new view
    /// gets its immediate pass plus the armed follow-up sequence.
    pub fn attach_tree(&mut self, tree: HostTree, now_ms: f64) {
        self.teardown();
        self.tree = Some(tree);
        self.scheduler.start_view(now_ms);
        self.run_pass(now_ms);
    }

    pub fn load_snapshot(&mut self, snapshot: &NodeSnapshot, now_ms: f64) {
        self.attach_tree(HostTree::from_snapshot(snapshot), now_ms);
    }

    /// Navigation away from the current view: remove every marker, close
    /// the popup, wipe all per-view state. Glossary and cache survive.
    pub fn teardown(&mut self) {
        if let Some(tree) = self.tree.as_mut() {
            if self.annotator.popup.open_entry_id().is_some() {
                self.events.push(EngineEvent::HideDefinition);
            }
            self.annotator.remove_all(tree);
        }
        self.tree = None;
        self.last_fingerprint = None;
        self.last_stats = None;
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Drain host mutations into the scheduler. Returns true when the
    /// batch armed a debounced pass.
    pub fn notify(&mut self, now_ms: f64) -> bool {
        let records = match self.tree.as_mut() {
            Some(tree) => tree.take_mutations(),
            None => return false,
        };
        self.scheduler.notify(&records, now_ms)
    }

    /// Earliest host-clock time `tick` has work to do.
    pub fn next_deadline_ms(&self) -> Option<f64> {
        self.scheduler.next_deadline_ms()
    }

    /// Fire due scheduled work. Returns true when a pass ran.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let Some(due) = self.scheduler.poll(now_ms) else {
            return false;
        };
        match due {
            DuePass::Mutation => self.run_pass(now_ms).is_some(),
            DuePass::FollowUp { .. } => {
                let Some(tree) = self.tree.as_ref() else {
                    return false;
                };
                let unsettled = self
                    .scheduler
                    .follow_up_worthwhile(tree.node_count(), loading_indicators_present(tree));
                if unsettled {
                    self.run_pass(now_ms).is_some()
                } else {
                    false
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // The pass
    // ------------------------------------------------------------------

    /// One scan-match-annotate cycle over the current tree state. Returns
    /// None when no pass ran (no view, engine off, or a pass already in
    /// flight).
    pub fn run_pass(&mut self, now_ms: f64) -> Option<PassStats> {
        if !self.config.is_active() {
            return None;
        }
        let mut tree = self.tree.take()?;
        if !self.scheduler.begin_pass() {
            self.tree = Some(tree);
            return None;
        }

        let overall_start = instant::Instant::now();
        let mut stats = PassStats::default();

        let dict_start = instant::Instant::now();
        let dict = self
            .cache
            .ensure(self.entries_version, &self.entries, &self.normalizer);
        stats.timings.dictionary_us = dict_start.elapsed().as_micros() as u64;

        let fingerprint = tree.text_fingerprint();
        stats.content_hash = format!("{:x}", fingerprint);
        if self.last_fingerprint == Some(fingerprint) {
            stats.was_skipped = true;
            stats.timings.total_us = overall_start.elapsed().as_micros() as u64;
            self.scheduler.finish_pass(now_ms, tree.node_count());
            self.tree = Some(tree);
            self.last_stats = Some(stats.clone());
            return Some(stats);
        }

        let scan_start = instant::Instant::now();
        let candidates: Vec<_> =
            TreeScanner::new(&tree, &self.normalizer, &self.config.scan).collect();
        stats.timings.scan_us = scan_start.elapsed().as_micros() as u64;
        stats.candidates = candidates.len();

        let apply_start = instant::Instant::now();
        let mut dedup = crate::engine::dedup::PassDedup::new();
        for candidate in &candidates {
            let Some(hit) = find_match(&dict, &candidate.normalized) else {
                // unmatched nodes stay unrecorded so a richer term set
                // can still claim them on a later pass
                continue;
            };
            stats.matches += 1;

            let section = self.resolver.resolve(&tree, candidate.node);
            if !self.config.section_allowed(section) {
                stats.section_suppressed += 1;
                continue;
            }
            if !dedup.claim(section, &hit.entry.id) {
                stats.dedup_suppressed += 1;
                continue;
            }
            if self.annotator.processed.is_processed(candidate.node) {
                stats.markers_kept += 1;
                continue;
            }
            match self.annotator.annotate(&mut tree, candidate.node, hit.entry, section) {
                Ok(marker) => {
                    stats.markers_inserted += 1;
                    self.events.push(EngineEvent::MarkerInserted {
                        marker,
                        entry_id: hit.entry.id.clone(),
                        section,
                    });
                }
                Err(message) => {
                    stats.errors.push(PassError { phase: "annotate".to_string(), message });
                }
            }
        }
        stats.timings.apply_us = apply_start.elapsed().as_micros() as u64;

        // Our own marker insertions are in the log now; drop them before
        // observation resumes or we would debounce ourselves forever.
        tree.take_mutations();
        self.last_fingerprint = Some(fingerprint);
        stats.timings.total_us = overall_start.elapsed().as_micros() as u64;
        self.scheduler.finish_pass(now_ms, tree.node_count());
        self.tree = Some(tree);
        self.last_stats = Some(stats.clone());
        Some(stats)
    }

    // ------------------------------------------------------------------
    // Popup input
    // ------------------------------------------------------------------

    /// A marker's activation surface was triggered.
    pub fn activate_marker(&mut self, marker: NodeId, now_ms: f64) -> Result<(), String> {
        let tree = self
            .tree
            .as_mut()
            .ok_or_else(|| "no view mounted".to_string())?;
        let entry_id = self
            .annotator
            .record_for_marker(marker)
            .map(|r| r.entry_id.clone())
            .ok_or_else(|| format!("no marker record for {:?}", marker))?;
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or_else(|| format!("marker references unknown entry {}", entry_id))?;

        match self.annotator.popup.activate(tree, marker, &entry, now_ms) {
            PopupTransition::Opened => {
                self.events.push(show_event(&entry));
            }
            PopupTransition::Toggled => {
                self.events.push(EngineEvent::HideDefinition);
            }
            PopupTransition::Switched { .. } => {
                self.events.push(EngineEvent::HideDefinition);
                self.events.push(show_event(&entry));
            }
        }
        Ok(())
    }

    /// Any pointer interaction in the view. Closes the popup when it
    /// lands outside both the open marker and the panel.
    pub fn pointer_down(&mut self, target: NodeId, now_ms: f64) {
        let Some(tree) = self.tree.as_mut() else {
            return;
        };
        if self.annotator.popup.pointer_down(tree, target, now_ms) {
            self.events.push(EngineEvent::HideDefinition);
        }
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn last_stats(&self) -> Option<&PassStats> {
        self.last_stats.as_ref()
    }

    pub fn tree(&self) -> Option<&HostTree> {
        self.tree.as_ref()
    }

    pub fn tree_mut(&mut self) -> Option<&mut HostTree> {
        self.tree.as_mut()
    }
}

/// Any element advertising a loading state by class?
fn loading_indicators_present(tree: &HostTree) -> bool {
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        if let Some(class) = tree.attr(node, "class") {
            if LOADING_CLASS_HINTS.iter().any(|hint| class.contains(hint)) {
                return true;
            }
        }
        for child in tree.children(node).iter().rev() {
            stack.push(*child);
        }
    }
    false
}

fn show_event(entry: &GlossaryEntry) -> EngineEvent {
    EngineEvent::ShowDefinition {
        entry_id: entry.id.clone(),
        title: entry.title.clone(),
        definition_html: entry.definition_html.clone(),
        link: entry.metadata.link.clone(),
        category: entry.metadata.category.clone(),
    }
}

// =============================================================================
// WASM boundary
// =============================================================================

#[wasm_bindgen]
impl AnnotationEngine {
    /// Create an engine with optional JSON configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<AnnotationEngine, JsValue> {
        let config: EngineConfig = if config.is_null() || config.is_undefined() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };
        Ok(Self::with_config(config))
    }

    #[wasm_bindgen(js_name = hydrateGlossary)]
    pub fn js_hydrate_glossary(&mut self, entries: JsValue, version: f64) -> Result<(), JsValue> {
        let entries: Vec<GlossaryEntry> = serde_wasm_bindgen::from_value(entries)
            .map_err(|e| JsValue::from_str(&format!("Invalid entries: {}", e)))?;
        self.hydrate_glossary(entries, version as u64, js_sys::Date::now());
        Ok(())
    }

    #[wasm_bindgen(js_name = setConfig)]
    pub fn js_set_config(&mut self, config: JsValue) -> Result<(), JsValue> {
        let config: EngineConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
        self.set_config(config, js_sys::Date::now());
        Ok(())
    }

    #[wasm_bindgen(js_name = loadSnapshot)]
    pub fn js_load_snapshot(&mut self, snapshot: JsValue) -> Result<(), JsValue> {
        let snapshot: NodeSnapshot = serde_wasm_bindgen::from_value(snapshot)
            .map_err(|e| JsValue::from_str(&format!("Invalid snapshot: {}", e)))?;
        self.load_snapshot(&snapshot, js_sys::Date::now());
        Ok(())
    }

    #[wasm_bindgen(js_name = notify)]
    pub fn js_notify(&mut self) -> bool {
        self.notify(js_sys::Date::now())
    }

    #[wasm_bindgen(js_name = tick)]
    pub fn js_tick(&mut self) -> bool {
        self.tick(js_sys::Date::now())
    }

    #[wasm_bindgen(js_name = nextDeadlineMs)]
    pub fn js_next_deadline_ms(&self) -> Option<f64> {
        self.next_deadline_ms()
    }

    #[wasm_bindgen(js_name = activateMarker)]
    pub fn js_activate_marker(&mut self, marker: u32) -> Result<(), JsValue> {
        self.activate_marker(NodeId::from_raw(marker), js_sys::Date::now())
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn js_pointer_down(&mut self, target: u32) {
        self.pointer_down(NodeId::from_raw(target), js_sys::Date::now());
    }

    #[wasm_bindgen(js_name = takeEvents)]
    pub fn js_take_events(&mut self) -> JsValue {
        let events = self.take_events();
        match serde_wasm_bindgen::to_value(&events) {
            Ok(v) => v,
            Err(e) => {
                web_sys::console::error_1(
                    &format!("[AnnotationEngine] Event serialization failed: {:?}", e).into(),
                );
                JsValue::NULL
            }
        }
    }

    #[wasm_bindgen(js_name = lastStats)]
    pub fn js_last_stats(&self) -> JsValue {
        match serde_wasm_bindgen::to_value(&self.last_stats) {
            Ok(v) => v,
            Err(e) => {
                web_sys::console::error_1(
                    &format!("[AnnotationEngine] Stats serialization failed: {:?}", e).into(),
                );
                JsValue::NULL
            }
        }
    }

    #[wasm_bindgen(js_name = teardown)]
    pub fn js_teardown(&mut self) {
        self.teardown();
    }

    #[wasm_bindgen(js_name = markerCount)]
    pub fn marker_count(&self) -> usize {
        self.annotator.marker_count()
    }

    /// Engine status for host debugging.
    #[wasm_bindgen(js_name = getStatus)]
    pub fn get_status(&self) -> JsValue {
        let status = serde_json::json!({
            "glossary_hydrated": self.glossary_hydrated,
            "entries": self.entries.len(),
            "cache_version": self.cache.version(),
            "cache_built": self.cache.is_built(),
            "view_mounted": self.tree.is_some(),
            "markers": self.annotator.marker_count(),
            "open_popup": self.annotator.popup.open_entry_id(),
            "scheduler_state": self.scheduler.state_name(),
            "dropped_triggers": self.scheduler.dropped_triggers(),
            "config": {
                "enabled": self.config.enabled,
                "feature_toggle": self.config.feature_toggle,
            }
        });
        JsValue::from_str(&status.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
