//! Day time-boxing
//!
//! Phase 3: walk the day from 09:00, consuming travel, security buffers, and
//! visit durations; insert lunch and dinner windows unless a meal-themed POI
//! already covers them; demote anything that would run past 21:00.

use std::collections::HashMap;

use crate::domain::{Poi, ScheduleItem, TimeOfDay, TimeSlot, TransportMode};
use crate::providers::{RoutePlanner, RouteQuery};
use crate::retry::Deadline;

pub const DAY_START: TimeOfDay = TimeOfDay(9 * 60);
pub const DAY_END: TimeOfDay = TimeOfDay(21 * 60);

const LUNCH_START: TimeOfDay = TimeOfDay(11 * 60 + 30);
const LUNCH_END: TimeOfDay = TimeOfDay(13 * 60 + 30);
const DINNER_START: TimeOfDay = TimeOfDay(17 * 60 + 30);
const DINNER_END: TimeOfDay = TimeOfDay(19 * 60 + 30);
const MEAL_MINUTES: f64 = 60.0;

/// Buffer before entering a POI. Peak calendar days dominate, and the whole
/// buffer inflates 1.5x inside the peak window.
pub fn security_buffer_minutes(poi: &Poi, peak: bool) -> f64 {
    if peak {
        30.0 * 1.5
    } else if poi.reservation_required {
        15.0
    } else {
        0.0
    }
}

/// Everything a day walk needs
pub struct TimeboxInputs<'a> {
    pub mode: TransportMode,
    pub peak: bool,
    pub cluster_of: &'a HashMap<String, String>,
    pub routes: &'a RoutePlanner,
    pub deadline: Deadline,
}

/// Outcome of time-boxing one day
pub struct TimeboxResult {
    pub items: Vec<ScheduleItem>,

    /// POIs that ran past the day end, demoted to backups
    pub demoted: Vec<Poi>,

    pub meal_windows: Vec<String>,

    /// Routing confidence per computed leg
    pub leg_confidences: Vec<f64>,
}

/// Time-box one day's ordered POIs
pub async fn timebox_day(ordered: &[Poi], inputs: TimeboxInputs<'_>) -> TimeboxResult {
    let mut items: Vec<ScheduleItem> = Vec::new();
    let mut demoted: Vec<Poi> = Vec::new();
    let mut meal_windows: Vec<String> = Vec::new();
    let mut leg_confidences: Vec<f64> = Vec::new();

    let mut clock = DAY_START;
    let mut lunch_done = false;
    let mut dinner_done = false;
    let mut prev: Option<&Poi> = None;

    for poi in ordered {
        let (travel_minutes, confidence) = match prev {
            None => (0.0, 1.0),
            Some(previous) => {
                let leg = inputs
                    .routes
                    .leg(
                        &RouteQuery {
                            from_id: previous.id.clone(),
                            from: (previous.lat, previous.lon),
                            to_id: poi.id.clone(),
                            to: (poi.lat, poi.lon),
                            mode: inputs.mode,
                        },
                        inputs.deadline,
                    )
                    .await;
                (leg.minutes, leg.confidence)
            }
        };

        let buffer_minutes = security_buffer_minutes(poi, inputs.peak);
        let mut arrival = clock.plus_minutes(travel_minutes + buffer_minutes);

        // Meals: a window is reserved once the walk crosses into it, unless
        // this POI is itself the meal.
        if !lunch_done && arrival >= LUNCH_START {
            if is_meal_poi(poi) && arrival < LUNCH_END {
                lunch_done = true;
            } else {
                let lunch_at = arrival.clamp(LUNCH_START, LUNCH_END);
                meal_windows.push(format!("{}-{}", lunch_at, lunch_at.plus_minutes(MEAL_MINUTES)));
                arrival = lunch_at.plus_minutes(MEAL_MINUTES).max(arrival);
                lunch_done = true;
            }
        }
        if !dinner_done && arrival >= DINNER_START {
            if is_meal_poi(poi) && arrival < DINNER_END {
                dinner_done = true;
            } else {
                let dinner_at = arrival.clamp(DINNER_START, DINNER_END);
                meal_windows.push(format!("{}-{}", dinner_at, dinner_at.plus_minutes(MEAL_MINUTES)));
                arrival = dinner_at.plus_minutes(MEAL_MINUTES).max(arrival);
                dinner_done = true;
            }
        }

        // Opening hours: wait for the door, give up close to closing
        if let Some((open, close)) = parse_open_hours(poi.open_hours.as_deref()) {
            if arrival < open {
                arrival = open;
            }
            if arrival.minutes() + 15 >= close.minutes() {
                demoted.push(poi.clone());
                continue;
            }
        }

        let duration_minutes = poi.duration_hours * 60.0;
        let end = arrival.plus_minutes(duration_minutes);
        if end > DAY_END {
            demoted.push(poi.clone());
            continue;
        }

        let cluster = inputs
            .cluster_of
            .get(&poi.id)
            .cloned()
            .unwrap_or_else(|| "geo:0".to_string());

        let mut notes = format!("cluster={cluster} | routing_confidence={confidence:.2}");
        if poi.reservation_required {
            notes.push_str(" | reservation_required");
        }
        if !poi.closed_rules.is_empty() {
            notes.push_str(&format!(" | {}", poi.closed_rules));
        }

        if prev.is_some() {
            leg_confidences.push(confidence);
        }
        items.push(ScheduleItem {
            poi_id: poi.id.clone(),
            time_slot: TimeSlot::for_time(arrival),
            start_time: Some(arrival),
            end_time: Some(end),
            travel_minutes: round1(travel_minutes),
            buffer_minutes: round1(buffer_minutes),
            notes,
            is_backup: false,
            cluster,
        });

        clock = end;
        prev = Some(poi);
    }

    TimeboxResult {
        items,
        demoted,
        meal_windows,
        leg_confidences,
    }
}

fn is_meal_poi(poi: &Poi) -> bool {
    poi.themes.iter().any(|t| t.eq_ignore_ascii_case("food"))
}

/// Parse "HH:MM-HH:MM"
pub fn parse_open_hours(open_hours: Option<&str>) -> Option<(TimeOfDay, TimeOfDay)> {
    let text = open_hours?.trim();
    let (open, close) = text.split_once('-')?;
    let open = TimeOfDay::parse(open)?;
    let close = TimeOfDay::parse(close)?;
    (open < close).then_some((open, close))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
