//! The individual rule checks
//!
//! Each check is independent and read-only. Thresholds:
//! 12h wall-clock, 35% travel share, 1.05x budget ceiling, 0.85x feasibility
//! floor, pace limits per day, 1..180 minute legs, max(2, days/2) cluster
//! switches.

use std::collections::HashSet;

use crate::domain::{Issue, IssueCode, Itinerary, TripConstraints};

const MAX_WALL_CLOCK_MINUTES: f64 = 12.0 * 60.0;
const MAX_TRAVEL_SHARE: f64 = 0.35;
const BUDGET_CEILING_FACTOR: f64 = 1.05;
const FEASIBILITY_FLOOR_FACTOR: f64 = 0.85;
const MIN_LEG_MINUTES: f64 = 1.0;
const MAX_LEG_MINUTES: f64 = 180.0;

/// OVER_TIME: a day exceeds 12h wall-clock
pub fn check_over_time(itinerary: &Itinerary, _constraints: &TripConstraints) -> Vec<Issue> {
    itinerary
        .days
        .iter()
        .filter(|day| day.wall_clock_minutes() > MAX_WALL_CLOCK_MINUTES)
        .map(|day| {
            Issue::new(
                IssueCode::OverTime,
                format!(
                    "day {} spans {:.0} minutes, over the {:.0} minute cap",
                    day.day_number,
                    day.wall_clock_minutes(),
                    MAX_WALL_CLOCK_MINUTES
                ),
            )
            .on_day(day.day_number)
        })
        .collect()
}

/// TOO_MUCH_TRAVEL: travel exceeds 35% of a day's wall-clock
pub fn check_too_much_travel(itinerary: &Itinerary, _constraints: &TripConstraints) -> Vec<Issue> {
    itinerary
        .days
        .iter()
        .filter(|day| {
            let wall = day.wall_clock_minutes();
            wall > 0.0 && day.travel_minutes() > wall * MAX_TRAVEL_SHARE
        })
        .map(|day| {
            Issue::new(
                IssueCode::TooMuchTravel,
                format!(
                    "day {} spends {:.0} of {:.0} minutes in transit",
                    day.day_number,
                    day.travel_minutes(),
                    day.wall_clock_minutes()
                ),
            )
            .on_day(day.day_number)
        })
        .collect()
}

/// OVER_BUDGET: total cost exceeds the stated budget with 5% tolerance
pub fn check_over_budget(itinerary: &Itinerary, constraints: &TripConstraints) -> Vec<Issue> {
    let Some(limit) = constraints.total_budget() else {
        return Vec::new();
    };
    if itinerary.total_cost > limit * BUDGET_CEILING_FACTOR {
        vec![Issue::new(
            IssueCode::OverBudget,
            format!(
                "total cost {:.0} exceeds budget {:.0} (with 5% tolerance)",
                itinerary.total_cost, limit
            ),
        )]
    } else {
        Vec::new()
    }
}

/// BUDGET_UNREALISTIC: the stated budget (or a repair-trimmed cost) sits
/// below 85% of the minimum feasible spend
pub fn check_budget_realism(itinerary: &Itinerary, constraints: &TripConstraints) -> Vec<Issue> {
    let floor = itinerary.minimum_feasible_budget * FEASIBILITY_FLOOR_FACTOR;
    if floor <= 0.0 {
        return Vec::new();
    }

    let mut issues = Vec::new();
    if let Some(limit) = constraints.total_budget() {
        if limit < floor {
            issues.push(Issue::new(
                IssueCode::BudgetUnrealistic,
                format!(
                    "stated budget {:.0} is below the feasible floor {:.0} (minimum {:.0})",
                    limit, floor, itinerary.minimum_feasible_budget
                ),
            ));
        }
    }
    if itinerary.total_cost < floor && issues.is_empty() {
        issues.push(Issue::new(
            IssueCode::BudgetUnrealistic,
            format!(
                "planned cost {:.0} fell below the feasible floor {:.0}",
                itinerary.total_cost, floor
            ),
        ));
    }
    issues
}

/// PACE_MISMATCH: more scheduled POIs in a day than the pace allows
pub fn check_pace(itinerary: &Itinerary, constraints: &TripConstraints) -> Vec<Issue> {
    let max_pois = constraints.pace.max_pois_per_day();
    itinerary
        .days
        .iter()
        .filter(|day| day.items.len() > max_pois)
        .map(|day| {
            Issue::new(
                IssueCode::PaceMismatch,
                format!(
                    "day {} schedules {} stops, over the {:?} limit of {}",
                    day.day_number,
                    day.items.len(),
                    constraints.pace,
                    max_pois
                ),
            )
            .on_day(day.day_number)
        })
        .collect()
}

/// TRAVEL_TIME_INVALID: a leg under 1 minute or over 180
pub fn check_travel_times(itinerary: &Itinerary, _constraints: &TripConstraints) -> Vec<Issue> {
    let mut issues = Vec::new();
    for day in &itinerary.days {
        for (idx, item) in day.items.iter().enumerate() {
            if idx == 0 {
                continue;
            }
            if item.travel_minutes < MIN_LEG_MINUTES || item.travel_minutes > MAX_LEG_MINUTES {
                issues.push(
                    Issue::new(
                        IssueCode::TravelTimeInvalid,
                        format!(
                            "leg into {} computed at {:.1} minutes",
                            item.poi_id, item.travel_minutes
                        ),
                    )
                    .on_day(day.day_number)
                    .on_poi(&item.poi_id),
                );
            }
        }
    }
    issues
}

/// MISSING_FACTS: a scheduled POI lacks open hours or a usable duration
pub fn check_missing_facts(itinerary: &Itinerary, _constraints: &TripConstraints) -> Vec<Issue> {
    let mut issues = Vec::new();
    for (day, item) in itinerary.scheduled_items() {
        let Some(poi) = itinerary.pois.get(&item.poi_id) else {
            issues.push(
                Issue::new(
                    IssueCode::MissingFacts,
                    format!("{} is scheduled but absent from the POI arena", item.poi_id),
                )
                .on_day(day.day_number)
                .on_poi(&item.poi_id),
            );
            continue;
        };

        let mut missing = Vec::new();
        if poi.open_hours.as_deref().map_or(true, |h| h.trim().is_empty()) {
            missing.push("open_hours");
        }
        if poi.duration_hours <= 0.0 {
            missing.push("duration");
        }
        if !missing.is_empty() {
            issues.push(
                Issue::new(
                    IssueCode::MissingFacts,
                    format!("{} missing required facts: {}", poi.name, missing.join(", ")),
                )
                .on_day(day.day_number)
                .on_poi(&poi.id),
            );
        }
    }
    issues
}

/// ROUTE_BACKTRACKING: too many cluster switches within a day
pub fn check_backtracking(itinerary: &Itinerary, constraints: &TripConstraints) -> Vec<Issue> {
    let allowed = 2usize.max((constraints.days / 2) as usize);
    itinerary
        .days
        .iter()
        .filter(|day| day.cluster_switches() > allowed)
        .map(|day| {
            Issue::new(
                IssueCode::RouteBacktracking,
                format!(
                    "day {} switches areas {} times (allowed {})",
                    day.day_number,
                    day.cluster_switches(),
                    allowed
                ),
            )
            .on_day(day.day_number)
        })
        .collect()
}

/// DUPLICATE_POI_DAY: the same POI twice in one day. The scheduler makes
/// this unreachable; seeing it means an invariant broke upstream.
pub fn check_duplicates(itinerary: &Itinerary, _constraints: &TripConstraints) -> Vec<Issue> {
    let mut issues = Vec::new();
    for day in &itinerary.days {
        let mut seen: HashSet<&str> = HashSet::new();
        for item in &day.items {
            if !seen.insert(item.poi_id.as_str()) {
                issues.push(
                    Issue::new(
                        IssueCode::DuplicatePoiDay,
                        format!("{} appears twice on day {}", item.poi_id, day.day_number),
                    )
                    .on_day(day.day_number)
                    .on_poi(&item.poi_id),
                );
            }
        }
    }
    issues
}

/// MISSING_BACKUP: a day with no backup option
pub fn check_backups(itinerary: &Itinerary, _constraints: &TripConstraints) -> Vec<Issue> {
    itinerary
        .days
        .iter()
        .filter(|day| day.backups.is_empty() && !day.items.iter().any(|i| i.is_backup))
        .map(|day| {
            Issue::new(
                IssueCode::MissingBackup,
                format!("day {} has no backup option", day.day_number),
            )
            .on_day(day.day_number)
        })
        .collect()
}
