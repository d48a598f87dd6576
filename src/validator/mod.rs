//! Itinerary validation
//!
//! Runs every rule check and reports all findings; no check short-circuits
//! another. The repair loop keys off the returned issue set.

use tracing::debug;

pub mod checks;

use crate::domain::{Issue, Itinerary, Severity, TripConstraints};

/// Run all rule checks over the itinerary
pub fn run_all_validators(itinerary: &Itinerary, constraints: &TripConstraints) -> Vec<Issue> {
    let mut issues = Vec::new();
    issues.extend(checks::check_over_time(itinerary, constraints));
    issues.extend(checks::check_too_much_travel(itinerary, constraints));
    issues.extend(checks::check_over_budget(itinerary, constraints));
    issues.extend(checks::check_budget_realism(itinerary, constraints));
    issues.extend(checks::check_pace(itinerary, constraints));
    issues.extend(checks::check_travel_times(itinerary, constraints));
    issues.extend(checks::check_missing_facts(itinerary, constraints));
    issues.extend(checks::check_backtracking(itinerary, constraints));
    issues.extend(checks::check_duplicates(itinerary, constraints));
    issues.extend(checks::check_backups(itinerary, constraints));

    debug!(count = issues.len(), "validate: issues found");
    issues
}

/// Repair is warranted only for unresolved issues at medium or above
pub fn needs_repair(issues: &[Issue]) -> bool {
    issues.iter().any(|i| i.severity >= Severity::Medium)
}
