//! ChangeScheduler - When passes run
//!
//! Explicit state machine over pass execution instead of ad hoc flags:
//!
//! - `Idle`: observing, nothing due.
//! - `Scanning`: a pass is running. Observation is disconnected and any
//!   trigger arriving now is dropped (not queued) - annotation mutates the
//!   tree, and this guard is what stops the engine from re-triggering
//!   itself through its own observer.
//! - `MutationPending`: a debounced pass is armed. Later triggers coalesce
//!   into the same deadline; a pending pass is superseded, never stacked.
//!
//! The scheduler owns no timers. The host clock arrives as `now_ms`
//! parameters; the host asks `next_deadline_ms` and calls `poll` when a
//! timer fires. Trivial mutations (attribute churn outside the structural
//! set) are filtered out before they can arm the debounce at all.
//!
//! Freshly loaded views get an adaptive sequence: one immediate pass, then
//! up to two delayed re-passes that the engine runs only while the view
//! still looks unsettled (loading indicators present or node count still
//! growing). A handful of conditional passes is far cheaper than the
//! fixed-count unconditional retries it replaces.

use crate::engine::config::ScheduleConfig;
use crate::engine::tree::{MutationKind, MutationRecord};

// =============================================================================
// Constants
// =============================================================================

/// Attribute names whose changes can affect scanning or classification.
/// Everything else is churn (tooltips, tracking ids) and never triggers.
const STRUCTURAL_ATTRS: [&str; 4] = ["class", "style", "hidden", "role"];

/// Number of delayed re-passes after a view load.
const FOLLOW_UP_STAGES: usize = 2;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Scanning,
    MutationPending,
}

/// What `poll` decided is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuePass {
    /// Debounced mutation pass; runs unconditionally.
    Mutation,
    /// Post-load re-pass; the engine runs it only if the view still looks
    /// unsettled.
    FollowUp { stage: u8 },
}

// =============================================================================
// ChangeScheduler
// =============================================================================

pub struct ChangeScheduler {
    state: State,
    config: ScheduleConfig,
    debounce_deadline_ms: Option<f64>,
    /// Absolute fire times for the post-load re-passes.
    follow_ups: Vec<(u8, f64)>,
    last_pass_end_ms: Option<f64>,
    /// Node count at the end of the previous pass, for growth checks.
    baseline_node_count: usize,
    dropped_triggers: u64,
}

impl ChangeScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            state: State::Idle,
            config,
            debounce_deadline_ms: None,
            follow_ups: Vec::new(),
            last_pass_end_ms: None,
            baseline_node_count: 0,
            dropped_triggers: 0,
        }
    }

    pub fn set_config(&mut self, config: ScheduleConfig) {
        self.config = config;
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            State::Idle => "idle",
            State::Scanning => "scanning",
            State::MutationPending => "mutation-pending",
        }
    }

    /// Observation is live except while a pass runs.
    pub fn is_observing(&self) -> bool {
        self.state != State::Scanning
    }

    pub fn dropped_triggers(&self) -> u64 {
        self.dropped_triggers
    }

    /// A new view mounted. Arms the post-load re-pass sequence; the caller
    /// runs the immediate pass itself.
    pub fn start_view(&mut self, now_ms: f64) {
        self.state = State::Idle;
        self.debounce_deadline_ms = None;
        self.last_pass_end_ms = None;
        self.baseline_node_count = 0;
        self.follow_ups = (0..FOLLOW_UP_STAGES)
            .map(|stage| {
                let delay = match stage {
                    0 => self.config.second_pass_delay_ms,
                    _ => self.config.third_pass_delay_ms,
                };
                (stage as u8 + 2, now_ms + delay)
            })
            .collect();
    }

    /// Mutation records observed on the host tree. Returns true when the
    /// batch armed (or re-armed) the debounced pass.
    pub fn notify(&mut self, records: &[MutationRecord], now_ms: f64) -> bool {
        if !records.iter().any(is_significant) {
            return false;
        }
        if self.state == State::Scanning {
            // Guard: our own annotations must not re-trigger us.
            self.dropped_triggers += 1;
            return false;
        }

        let mut deadline = now_ms + self.config.debounce_ms;
        if let Some(end) = self.last_pass_end_ms {
            deadline = deadline.max(end + self.config.min_pass_interval_ms);
        }
        self.debounce_deadline_ms = Some(deadline);
        self.state = State::MutationPending;
        true
    }

    /// Earliest moment `poll` would have work, if any.
    pub fn next_deadline_ms(&self) -> Option<f64> {
        let follow = self.follow_ups.iter().map(|(_, at)| *at).fold(f64::INFINITY, f64::min);
        let debounce = self.debounce_deadline_ms.unwrap_or(f64::INFINITY);
        let next = follow.min(debounce);
        (next != f64::INFINITY).then_some(next)
    }

    /// What, if anything, is due at `now_ms`. Debounced mutation passes
    /// take precedence over follow-ups.
    pub fn poll(&mut self, now_ms: f64) -> Option<DuePass> {
        if self.state == State::Scanning {
            return None;
        }
        if let Some(deadline) = self.debounce_deadline_ms {
            if now_ms >= deadline {
                self.debounce_deadline_ms = None;
                return Some(DuePass::Mutation);
            }
        }
        if let Some(pos) = self.follow_ups.iter().position(|(_, at)| now_ms >= *at) {
            let (stage, _) = self.follow_ups.remove(pos);
            return Some(DuePass::FollowUp { stage });
        }
        None
    }

    /// Re-entrancy gate around a pass. False = a pass is already running
    /// and this trigger is dropped.
    pub fn begin_pass(&mut self) -> bool {
        if self.state == State::Scanning {
            return false;
        }
        self.state = State::Scanning;
        self.debounce_deadline_ms = None;
        true
    }

    /// Pass finished; observation resumes.
    pub fn finish_pass(&mut self, now_ms: f64, node_count: usize) {
        self.state = State::Idle;
        self.last_pass_end_ms = Some(now_ms);
        self.baseline_node_count = node_count;
    }

    /// Should a due follow-up actually run? Only while the view still
    /// looks unsettled.
    pub fn follow_up_worthwhile(&self, node_count: usize, loading_present: bool) -> bool {
        loading_present || node_count > self.baseline_node_count
    }
}

/// ChildList and text changes always count; attribute changes only for
/// the structural set.
fn is_significant(record: &MutationRecord) -> bool {
    match &record.kind {
        MutationKind::ChildList | MutationKind::Text => true,
        MutationKind::Attribute { name } => STRUCTURAL_ATTRS.contains(&name.as_str()),
    }
}

// =============================================================================
// Tests
// =============================================================================
