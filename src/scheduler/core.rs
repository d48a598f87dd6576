//! Scheduler: candidate pool -> day-by-day itinerary
//!
//! Four phases: geographic day partitioning, intra-day ordering, time-boxing,
//! budget accounting. Validation happens downstream; the only issues raised
//! here are must-visit closures the schedule cannot route around.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::{BudgetConfig, PlannerConfig};
use crate::domain::{
    Issue, IssueCode, Itinerary, ItineraryDay, Poi, PoiArena, ScheduleItem, TripConstraints,
    UserProfile,
};
use crate::providers::RoutePlanner;
use crate::retrieve::CandidatePool;
use crate::retry::Deadline;

use super::budget::apply_budget;
use super::cluster::{assign_clusters_to_days, cluster_lookup, single_link_clusters, DayCapacity};
use super::distance::poi_crow_km;
use super::ordering::nearest_neighbor_order;
use super::timebox::{timebox_day, TimeboxInputs};

/// Same-theme replacements for closed POIs must sit within this radius
const REPLACEMENT_RADIUS_KM: f64 = 2.0;

pub struct Scheduler {
    routes: Arc<RoutePlanner>,
    planner: PlannerConfig,
    budget: BudgetConfig,
}

impl Scheduler {
    pub fn new(routes: Arc<RoutePlanner>, planner: PlannerConfig, budget: BudgetConfig) -> Self {
        Self {
            routes,
            planner,
            budget,
        }
    }

    /// Build a full itinerary from the ranked candidate pool
    pub async fn build_itinerary(
        &self,
        pool: &CandidatePool,
        constraints: &TripConstraints,
        profile: &UserProfile,
        deadline: Deadline,
    ) -> Itinerary {
        debug!(pool = pool.pois.len(), days = constraints.days, "schedule: build");
        let pois = &pool.pois;
        let arena: PoiArena = pois.iter().cloned().collect();

        // Phase 1: clusters -> days
        let clusters = single_link_clusters(pois, constraints.transport_mode);
        let cluster_of = cluster_lookup(pois, &clusters);
        let capacity = DayCapacity {
            hours: self.planner.daily_activity_hours,
            max_pois: constraints.pace.max_pois_per_day(),
        };
        let (mut day_members, mut leftovers) =
            assign_clusters_to_days(pois, clusters, constraints.days, capacity);

        // Closed-rule resolution before ordering
        let mut issues: Vec<Issue> = Vec::new();
        let mut assumptions: Vec<String> = Vec::new();
        self.resolve_closures(
            pois,
            &mut day_members,
            &mut leftovers,
            constraints,
            &mut issues,
            &mut assumptions,
        );

        let peak = self.trip_peak_days(constraints) > 0;
        if peak {
            assumptions.push(format!(
                "peak season window around {}: security buffers inflated 1.5x",
                self.planner.spring_festival_date
            ));
        }

        // Phases 2 + 3 per day
        let mut days: Vec<ItineraryDay> = Vec::new();
        let mut leg_confidences: Vec<f64> = Vec::new();
        for (day_idx, members) in day_members.iter().enumerate() {
            let day_number = day_idx as u32 + 1;
            let date = constraints.date_of_day(day_number);
            let mut day = ItineraryDay::new(day_number, date);

            let order = nearest_neighbor_order(pois, members);
            let ordered: Vec<Poi> = order.iter().map(|&i| pois[i].clone()).collect();

            let result = timebox_day(
                &ordered,
                TimeboxInputs {
                    mode: constraints.transport_mode,
                    peak: date.map(|d| self.planner.in_peak_window(d)).unwrap_or(peak),
                    cluster_of: &cluster_of,
                    routes: &self.routes,
                    deadline,
                },
            )
            .await;

            day.items = result.items;
            day.meal_windows = result.meal_windows;
            leg_confidences.extend(result.leg_confidences);

            for demoted in result.demoted {
                day.backups
                    .push(ScheduleItem::backup(&demoted.id, "did not fit the day window"));
            }

            days.push(day);
        }

        // Backups from the leftover pool for days that have none
        self.fill_backups(pois, &leftovers, &cluster_of, &mut days);

        for day in days.iter_mut() {
            day.day_summary = day_summary(day, &arena);
        }

        let mut itinerary = Itinerary {
            city: constraints.city.clone(),
            days,
            pois: arena,
            assumptions,
            issues,
            routing_confidence: average_confidence(&leg_confidences),
            ..Default::default()
        };

        // Phase 4
        apply_budget(
            &mut itinerary,
            constraints,
            profile,
            self.budget.food_min_per_person_per_day,
        );
        if let Some(warning) = itinerary.budget_warning.clone() {
            itinerary.assumptions.push(warning);
        }
        itinerary.summary = trip_summary(&itinerary);

        info!(
            days = itinerary.days.len(),
            total_cost = itinerary.total_cost,
            "schedule: built"
        );
        itinerary
    }

    /// Re-run time-boxing for a single day, keeping its current visit order.
    /// Used by repair strategies and edit patches; recomputes the budget.
    pub async fn retimebox_day(
        &self,
        itinerary: &mut Itinerary,
        day_number: u32,
        constraints: &TripConstraints,
        profile: &UserProfile,
        deadline: Deadline,
    ) {
        let peak_anchor = self.trip_peak_days(constraints) > 0;
        let (mode, cluster_of, ordered) = {
            let Some(day) = itinerary.day(day_number) else {
                return;
            };
            let mode = day.transport_mode.unwrap_or(constraints.transport_mode);
            let cluster_of: HashMap<String, String> = day
                .items
                .iter()
                .map(|i| (i.poi_id.clone(), i.cluster.clone()))
                .collect();
            let ordered: Vec<Poi> = day
                .items
                .iter()
                .filter_map(|i| itinerary.pois.get(&i.poi_id).cloned())
                .collect();
            (mode, cluster_of, ordered)
        };

        let date = constraints.date_of_day(day_number);
        let result = timebox_day(
            &ordered,
            TimeboxInputs {
                mode,
                peak: date.map(|d| self.planner.in_peak_window(d)).unwrap_or(peak_anchor),
                cluster_of: &cluster_of,
                routes: &self.routes,
                deadline,
            },
        )
        .await;

        let pois = itinerary.pois.clone();
        let day = itinerary.day_mut(day_number).expect("day checked above");
        day.items = result.items;
        day.meal_windows = result.meal_windows;
        for demoted in result.demoted {
            day.backups
                .push(ScheduleItem::backup(&demoted.id, "did not fit the day window"));
        }
        day.day_summary = day_summary(day, &pois);

        apply_budget(
            itinerary,
            constraints,
            profile,
            self.budget.food_min_per_person_per_day,
        );
        itinerary.summary = trip_summary(itinerary);
    }

    /// Count trip days that land inside the configured peak window
    fn trip_peak_days(&self, constraints: &TripConstraints) -> u32 {
        (1..=constraints.days)
            .filter_map(|n| constraints.date_of_day(n))
            .filter(|d| self.planner.in_peak_window(*d))
            .count() as u32
    }

    /// Handle POIs scheduled on a closed date: relocate pinned ones to an
    /// open day, replace others with a nearby same-theme candidate, and
    /// raise MUST_VISIT_CLOSED when a pin has no open day at all.
    fn resolve_closures(
        &self,
        pois: &[Poi],
        day_members: &mut [Vec<usize>],
        leftovers: &mut Vec<usize>,
        constraints: &TripConstraints,
        issues: &mut Vec<Issue>,
        assumptions: &mut Vec<String>,
    ) {
        if constraints.date_start.is_none() {
            return;
        }
        let dates: Vec<Option<NaiveDate>> = (1..=constraints.days)
            .map(|n| constraints.date_of_day(n))
            .collect();

        for day_idx in 0..day_members.len() {
            let Some(date) = dates.get(day_idx).copied().flatten() else {
                continue;
            };

            let closed_here: Vec<usize> = day_members[day_idx]
                .iter()
                .copied()
                .filter(|&i| !pois[i].is_open_on(date))
                .collect();

            for poi_idx in closed_here {
                let poi = &pois[poi_idx];

                if poi.pinned {
                    let open_day = dates.iter().enumerate().find(|(d_idx, d)| {
                        *d_idx != day_idx
                            && d.map(|date| poi.is_open_on(date)).unwrap_or(false)
                            && day_members[*d_idx].len() < constraints.pace.max_pois_per_day()
                    });
                    match open_day {
                        Some((target, _)) => {
                            day_members[day_idx].retain(|&i| i != poi_idx);
                            day_members[target].push(poi_idx);
                            assumptions.push(format!(
                                "moved {} to day {} to respect its closure rules",
                                poi.name,
                                target + 1
                            ));
                        }
                        None => {
                            issues.push(
                                Issue::new(
                                    IssueCode::MustVisitClosed,
                                    format!("{} is closed on every trip day ({})", poi.name, poi.closed_rules),
                                )
                                .on_day(day_idx as u32 + 1)
                                .on_poi(&poi.id),
                            );
                            assumptions.push(format!(
                                "{} kept in the plan despite closure: {}",
                                poi.name, poi.closed_rules
                            ));
                        }
                    }
                    continue;
                }

                // Replace with the next-best open candidate, same theme, within 2 km
                let replacement = leftovers.iter().copied().find(|&i| {
                    pois[i].is_open_on(date)
                        && pois[i].matches_any_theme(&poi.themes)
                        && poi_crow_km(&pois[i], poi) <= REPLACEMENT_RADIUS_KM
                });

                day_members[day_idx].retain(|&i| i != poi_idx);
                match replacement {
                    Some(sub_idx) => {
                        leftovers.retain(|&i| i != sub_idx);
                        day_members[day_idx].push(sub_idx);
                        leftovers.push(poi_idx);
                        assumptions.push(format!(
                            "replaced {} (closed on {}) with {}",
                            poi.name, date, pois[sub_idx].name
                        ));
                    }
                    None => {
                        leftovers.push(poi_idx);
                        assumptions.push(format!("dropped {} (closed on {})", poi.name, date));
                    }
                }
            }
        }
    }

    /// Give every day at least one backup from the unscheduled pool
    fn fill_backups(
        &self,
        pois: &[Poi],
        leftovers: &[usize],
        cluster_of: &HashMap<String, String>,
        days: &mut [ItineraryDay],
    ) {
        let mut used: HashSet<String> = days
            .iter()
            .flat_map(|d| d.items.iter().chain(d.backups.iter()))
            .map(|i| i.poi_id.clone())
            .collect();

        for day in days.iter_mut() {
            if !day.backups.is_empty() {
                continue;
            }
            let day_clusters: HashSet<&String> =
                day.items.iter().filter_map(|i| cluster_of.get(&i.poi_id)).collect();

            // Same-cluster leftovers first, then anything unused
            let pick = leftovers
                .iter()
                .copied()
                .filter(|&i| !used.contains(&pois[i].id))
                .max_by_key(|&i| {
                    let same_cluster = cluster_of
                        .get(&pois[i].id)
                        .map(|c| day_clusters.contains(c))
                        .unwrap_or(false);
                    (same_cluster, pois[i].indoor)
                });

            if let Some(idx) = pick {
                used.insert(pois[idx].id.clone());
                day.backups.push(ScheduleItem::backup(
                    &pois[idx].id,
                    "backup for rain or crowding",
                ));
            }
        }
    }
}

fn average_confidence(confidences: &[f64]) -> f64 {
    if confidences.is_empty() {
        return 0.6;
    }
    confidences.iter().sum::<f64>() / confidences.len() as f64
}

fn day_summary(day: &ItineraryDay, arena: &PoiArena) -> String {
    let names: Vec<&str> = day
        .items
        .iter()
        .filter_map(|i| arena.get(&i.poi_id))
        .map(|p| p.name.as_str())
        .collect();
    if names.is_empty() {
        format!("Day {}: open day", day.day_number)
    } else {
        format!("Day {}: {}", day.day_number, names.join(" -> "))
    }
}

fn trip_summary(itinerary: &Itinerary) -> String {
    let mut lines = vec![format!(
        "{} itinerary, {} days, estimated cost {:.0}",
        itinerary.city,
        itinerary.days.len(),
        itinerary.total_cost
    )];
    for day in &itinerary.days {
        lines.push(day.day_summary.clone());
    }
    lines.join("\n")
}
