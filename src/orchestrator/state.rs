//! Plan state and stage transitions
//!
//! The pipeline is an explicit state record plus pure transition functions;
//! the orchestrator is a loop over them. No graph framework, no callbacks.

use std::collections::BTreeMap;

use crate::domain::{Issue, Itinerary, TripConstraints, UserProfile};
use crate::intake::{ConstraintDraft, FieldEvidence, RequiredField};
use crate::retrieve::CandidatePool;
use crate::validator::needs_repair;

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intake,
    Clarify,
    Retrieve,
    Schedule,
    Validate,
    Repair,
    Finalize,
}

/// The single accumulating state a request carries through the pipeline
#[derive(Debug, Default)]
pub struct PlanState {
    pub message: String,

    pub draft: ConstraintDraft,
    pub profile: UserProfile,
    pub constraints: Option<TripConstraints>,

    pub missing: Vec<RequiredField>,
    pub field_evidence: BTreeMap<String, FieldEvidence>,

    pub pool: Option<CandidatePool>,
    pub itinerary: Option<Itinerary>,
    pub issues: Vec<Issue>,

    /// Repair rounds executed so far
    pub repair_rounds: u32,

    /// Cost and weighted-issue snapshot before the last repair round,
    /// for the progress invariant
    pub progress_snapshot: Option<(f64, u32)>,

    /// Repair actions accumulated across rounds
    pub repair_actions: Vec<String>,
}

/// After intake: clarify when required fields are missing
pub fn next_after_intake(state: &PlanState) -> Stage {
    if state.missing.is_empty() {
        Stage::Retrieve
    } else {
        Stage::Clarify
    }
}

/// After validation: repair only while actionable issues remain, the round
/// budget is not exhausted, and the previous round made progress.
pub fn next_after_validate(state: &PlanState, max_repair_rounds: u32) -> Stage {
    if !needs_repair(&state.issues) {
        return Stage::Finalize;
    }
    if state.repair_rounds >= max_repair_rounds {
        return Stage::Finalize;
    }
    if let (Some((prev_cost, prev_weighted)), Some(itinerary)) =
        (state.progress_snapshot, state.itinerary.as_ref())
    {
        let weighted: u32 = state.issues.iter().map(|i| i.severity.weight()).sum();
        let progressed = itinerary.total_cost < prev_cost - 1e-6 || weighted < prev_weighted;
        if !progressed {
            return Stage::Finalize;
        }
    }
    Stage::Repair
}
