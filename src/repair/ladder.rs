//! The repair strategy ladder
//!
//! Strategies in order of destructiveness: substitute a nearer same-theme
//! POI, drop low-priority items, upgrade the day's transport mode, accept
//! with assumptions. Each round must strictly decrease either total cost or
//! the severity-weighted issue sum; pinned items are never dropped.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::domain::{
    Issue, IssueCode, Itinerary, Poi, Severity, TripConstraints, UserProfile,
};
use crate::retrieve::CandidatePool;
use crate::retry::Deadline;
use crate::scheduler::distance::poi_distance_km;
use crate::scheduler::Scheduler;

/// Substitutes must land at no more than this share of the current leg
const SUBSTITUTE_DISTANCE_FACTOR: f64 = 0.6;

/// What one repair round did
#[derive(Debug, Default)]
pub struct RepairReport {
    /// Human-readable actions, appended to the itinerary's assumptions
    pub actions: Vec<String>,

    /// Highest ladder rung used this round (0 = none, 4 = accept)
    pub highest_strategy: u32,
}

pub struct Repairer<'a> {
    scheduler: &'a Scheduler,
    pool: &'a CandidatePool,
    constraints: &'a TripConstraints,
    profile: &'a UserProfile,
    deadline: Deadline,
}

impl<'a> Repairer<'a> {
    pub fn new(
        scheduler: &'a Scheduler,
        pool: &'a CandidatePool,
        constraints: &'a TripConstraints,
        profile: &'a UserProfile,
        deadline: Deadline,
    ) -> Self {
        Self {
            scheduler,
            pool,
            constraints,
            profile,
            deadline,
        }
    }

    /// Apply one round of the ladder against the given issues
    pub async fn repair_round(&self, itinerary: &mut Itinerary, issues: &[Issue]) -> RepairReport {
        let mut report = RepairReport::default();

        let travel_days: Vec<u32> = issue_days(issues, &[IssueCode::TooMuchTravel, IssueCode::RouteBacktracking]);
        let overload_days: Vec<u32> = issue_days(issues, &[IssueCode::OverTime, IssueCode::PaceMismatch]);
        let over_budget = issues.iter().any(|i| i.code == IssueCode::OverBudget);

        // Rung 1: substitute a nearer same-theme POI
        for day_number in &travel_days {
            if self.substitute_nearer(itinerary, *day_number, &mut report).await {
                report.highest_strategy = report.highest_strategy.max(1);
            }
        }

        // Rung 2: drop low-priority items
        if !overload_days.is_empty() || over_budget {
            let dropped = self
                .drop_low_priority(itinerary, &overload_days, over_budget, &mut report)
                .await;
            if dropped {
                report.highest_strategy = report.highest_strategy.max(2);
            }
        }

        // Rung 3: upgrade transport where travel is still excessive
        for day_number in &travel_days {
            if self.still_travel_heavy(itinerary, *day_number)
                && self.upgrade_transport(itinerary, *day_number, &mut report).await
            {
                report.highest_strategy = report.highest_strategy.max(3);
            }
        }

        // Rung 4: accept with assumptions. The orchestrator elevates the
        // degrade level and copies the surviving issues out.
        if report.actions.is_empty() {
            report.highest_strategy = 4;
            debug!("repair: ladder exhausted, accepting with assumptions");
        }

        info!(
            actions = report.actions.len(),
            highest_strategy = report.highest_strategy,
            "repair: round complete"
        );
        report
    }

    /// Replace the worst non-pinned leg's destination with a same-theme
    /// candidate at <= 0.6x the distance.
    async fn substitute_nearer(
        &self,
        itinerary: &mut Itinerary,
        day_number: u32,
        report: &mut RepairReport,
    ) -> bool {
        let used = itinerary.used_poi_ids();
        let date = self.constraints.date_of_day(day_number);

        let Some(day) = itinerary.day(day_number) else {
            return false;
        };

        // Worst leg: the non-pinned item with the longest travel
        let target = day
            .items
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, item)| {
                itinerary
                    .pois
                    .get(&item.poi_id)
                    .map(|p| !p.pinned)
                    .unwrap_or(false)
            })
            .max_by(|(_, a), (_, b)| {
                a.travel_minutes
                    .partial_cmp(&b.travel_minutes)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, item)| (idx, item.poi_id.clone()));

        let Some((item_idx, bad_id)) = target else {
            return false;
        };
        let prev_id = day.items[item_idx - 1].poi_id.clone();
        let (Some(bad), Some(prev)) = (itinerary.pois.get(&bad_id), itinerary.pois.get(&prev_id))
        else {
            return false;
        };

        let current_km = poi_distance_km(prev, bad);
        let max_km = current_km * SUBSTITUTE_DISTANCE_FACTOR;

        let replacement: Option<&Poi> = self
            .pool
            .pois
            .iter()
            .filter(|candidate| {
                !used.contains(&candidate.id)
                    && candidate.matches_any_theme(&bad.themes)
                    && poi_distance_km(prev, candidate) <= max_km
                    && date.map(|d| candidate.is_open_on(d)).unwrap_or(true)
            })
            .max_by(|a, b| {
                self.pool
                    .score_of(&a.id)
                    .partial_cmp(&self.pool.score_of(&b.id))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        let Some(replacement) = replacement.cloned() else {
            debug!(day_number, poi = %bad_id, "repair: no qualifying substitute");
            return false;
        };

        let action = format!(
            "day {}: replaced {} with nearer {} to cut travel",
            day_number, bad.name, replacement.name
        );
        itinerary.pois.insert(replacement.clone());
        let day = itinerary.day_mut(day_number).expect("day exists");
        day.items[item_idx].poi_id = replacement.id.clone();

        self.scheduler
            .retimebox_day(itinerary, day_number, self.constraints, self.profile, self.deadline)
            .await;
        report.actions.push(action);
        true
    }

    /// Drop the lowest-ranked non-pinned items until day limits and the
    /// budget ceiling hold. Days always keep their first stop.
    async fn drop_low_priority(
        &self,
        itinerary: &mut Itinerary,
        overload_days: &[u32],
        over_budget: bool,
        report: &mut RepairReport,
    ) -> bool {
        let mut touched: HashSet<u32> = HashSet::new();

        for &day_number in overload_days {
            let max_pois = self.constraints.pace.max_pois_per_day();
            loop {
                let Some(day) = itinerary.day(day_number) else {
                    break;
                };
                let over_time = day.wall_clock_minutes() > 12.0 * 60.0;
                let over_pace = day.items.len() > max_pois;
                if (!over_time && !over_pace) || day.items.len() <= 1 {
                    break;
                }
                if !self.drop_one(itinerary, day_number, report) {
                    break;
                }
                touched.insert(day_number);
                self.scheduler
                    .retimebox_day(itinerary, day_number, self.constraints, self.profile, self.deadline)
                    .await;
            }
        }

        if over_budget {
            if let Some(limit) = self.constraints.total_budget() {
                // Drop ticketed stops, cheapest rank first, while over budget
                for _ in 0..32 {
                    if itinerary.total_cost <= limit * 1.05 {
                        break;
                    }
                    let Some(day_number) = self.drop_costliest_low_rank(itinerary, report) else {
                        break;
                    };
                    touched.insert(day_number);
                    self.scheduler
                        .retimebox_day(itinerary, day_number, self.constraints, self.profile, self.deadline)
                        .await;
                }
            }
        }

        !touched.is_empty()
    }

    /// Remove the lowest-ranked non-pinned, non-first item of a day
    fn drop_one(&self, itinerary: &mut Itinerary, day_number: u32, report: &mut RepairReport) -> bool {
        let Some(day) = itinerary.day(day_number) else {
            return false;
        };

        let victim = day
            .items
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, item)| {
                itinerary
                    .pois
                    .get(&item.poi_id)
                    .map(|p| !p.pinned)
                    .unwrap_or(true)
            })
            .min_by(|(_, a), (_, b)| {
                self.pool
                    .score_of(&a.poi_id)
                    .partial_cmp(&self.pool.score_of(&b.poi_id))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, item)| (idx, item.poi_id.clone()));

        let Some((idx, poi_id)) = victim else {
            return false;
        };
        let name = itinerary
            .pois
            .get(&poi_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| poi_id.clone());

        let day = itinerary.day_mut(day_number).expect("day exists");
        day.items.remove(idx);
        report
            .actions
            .push(format!("day {day_number}: dropped {name} to fit the day"));
        true
    }

    /// Remove the lowest-ranked ticketed non-pinned item anywhere
    fn drop_costliest_low_rank(
        &self,
        itinerary: &mut Itinerary,
        report: &mut RepairReport,
    ) -> Option<u32> {
        let mut candidate: Option<(u32, usize, String, f64)> = None;

        for day in &itinerary.days {
            if day.items.len() <= 1 {
                continue;
            }
            for (idx, item) in day.items.iter().enumerate().skip(1) {
                let Some(poi) = itinerary.pois.get(&item.poi_id) else {
                    continue;
                };
                if poi.pinned || poi.effective_ticket() <= 0.0 {
                    continue;
                }
                let score = self.pool.score_of(&poi.id);
                let better = match &candidate {
                    Some((_, _, _, best_score)) => score < *best_score,
                    None => true,
                };
                if better {
                    candidate = Some((day.day_number, idx, poi.id.clone(), score));
                }
            }
        }

        let (day_number, idx, poi_id, _) = candidate?;
        let (name, ticket) = itinerary
            .pois
            .get(&poi_id)
            .map(|p| (p.name.clone(), p.effective_ticket()))
            .unwrap_or((poi_id.clone(), 0.0));

        let day = itinerary.day_mut(day_number)?;
        day.items.remove(idx);
        report.actions.push(format!(
            "day {day_number}: dropped {name} (ticket {ticket:.0}) to reduce cost"
        ));
        Some(day_number)
    }

    fn still_travel_heavy(&self, itinerary: &Itinerary, day_number: u32) -> bool {
        itinerary
            .day(day_number)
            .map(|day| {
                let wall = day.wall_clock_minutes();
                wall > 0.0 && day.travel_minutes() > wall * 0.35
            })
            .unwrap_or(false)
    }

    /// Shift one day to the next faster mode, noting the cost delta
    async fn upgrade_transport(
        &self,
        itinerary: &mut Itinerary,
        day_number: u32,
        report: &mut RepairReport,
    ) -> bool {
        let Some(day) = itinerary.day(day_number) else {
            return false;
        };
        let current = day.transport_mode.unwrap_or(self.constraints.transport_mode);
        let Some(faster) = current.next_faster() else {
            return false;
        };

        let cost_before = itinerary.total_cost;
        let day = itinerary.day_mut(day_number).expect("day exists");
        day.transport_mode = Some(faster);

        self.scheduler
            .retimebox_day(itinerary, day_number, self.constraints, self.profile, self.deadline)
            .await;

        let delta = itinerary.total_cost - cost_before;
        report.actions.push(format!(
            "day {day_number}: upgraded transport {current} -> {faster} (cost delta {delta:+.0})"
        ));
        true
    }
}

fn issue_days(issues: &[Issue], codes: &[IssueCode]) -> Vec<u32> {
    let mut days: Vec<u32> = issues
        .iter()
        .filter(|i| codes.contains(&i.code))
        .filter_map(|i| i.day_number)
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}

/// True when the round made measurable progress: cost strictly down, or the
/// severity-weighted issue sum strictly down.
pub fn made_progress(
    cost_before: f64,
    cost_after: f64,
    issues_before: &[Issue],
    issues_after: &[Issue],
) -> bool {
    let weighted_before: u32 = issues_before.iter().map(|i| i.severity.weight()).sum();
    let weighted_after: u32 = issues_after.iter().map(|i| i.severity.weight()).sum();
    cost_after < cost_before - 1e-6 || weighted_after < weighted_before
}

/// Issues at medium severity or above, the ones repair acts on
pub fn actionable<'a>(issues: &'a [Issue]) -> Vec<&'a Issue> {
    issues.iter().filter(|i| i.severity >= Severity::Medium).collect()
}
