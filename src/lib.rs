//! GlossCore: Glossary Term Annotation Engine
//!
//! A Rust/WASM engine that annotates a host-owned document tree with
//! contextual markers wherever visible label text matches a user-maintained
//! glossary, without perturbing the host layout.
//!
//! # Architecture
//!
//! ## Glossary Components (dictionary side)
//! - `normalize.rs` - TextNormalizer: canonical text forms for comparison
//! - `entry.rs` - GlossaryEntry: hydration model for glossary terms
//! - `dictionary.rs` - TermDictionary + DictionaryCache: version-stamped,
//!   length-ordered trigger index
//! - `matcher.rs` - Longest-first whole-label matching with plural fallback
//!
//! ## Engine Components (tree side)
//! - `tree.rs` - HostTree: arena mirror of the host document with a
//!   mutation log
//! - `section.rs` - SectionResolver: coarse page-region classification
//! - `scan.rs` - TreeScanner: candidate text-node discovery
//! - `dedup.rs` - PassDedup: first occurrence per (section, entry) per pass
//! - `popup.rs` - PopupState: the single open definition popup
//! - `annotate.rs` - Annotator: marker insertion/removal + processed index
//! - `schedule.rs` - ChangeScheduler: debounced, re-entrancy-guarded passes
//! - `pass.rs` - AnnotationEngine: unified coordinator + WASM facade
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { AnnotationEngine } from 'glosscore';
//!
//! await init();
//!
//! const engine = new AnnotationEngine(null);
//! engine.hydrateGlossary([
//!   { id: 'g1', title: 'Deal', trigger: 'deal', definitionHtml: '...' }
//! ], versionStamp);
//! engine.loadSnapshot(treeJson);
//!
//! // on DOM mutations mirrored in:
//! engine.notify();
//! // host timer wired to nextDeadlineMs():
//! engine.tick();
//!
//! // marker interaction:
//! engine.activateMarker(markerId);
//! for (const event of engine.takeEvents()) { renderPopup(event); }
//! ```

pub mod engine;
pub mod glossary;

// Public exports - Engine
pub use engine::*;

// Public exports - Glossary
pub use glossary::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Greet function for testing WASM binding
#[wasm_bindgen]
pub fn greet(name: &str) -> String {
    format!("Hello, {}! GlossCore WASM is ready.", name)
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("glosscore v{}", env!("CARGO_PKG_VERSION"))
}
