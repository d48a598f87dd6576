//! Chat-driven edit patches
//!
//! A restricted form of repair: replace, add, or remove a stop, adjust its
//! time, or force a lunch break. Each patch targets one day and re-runs
//! time-boxing for that day only; every other day is untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::PoiDataset;
use crate::domain::{normalize_name, Itinerary, Poi, ScheduleItem, TimeOfDay, TimeSlot, TripConstraints, UserProfile};
use crate::error::PlanError;
use crate::retry::Deadline;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceStop {
    pub day_number: u32,
    pub old_poi: Option<String>,
    pub new_poi: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddStop {
    pub day_number: u32,
    pub poi: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveStop {
    pub day_number: u32,
    pub poi: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustTime {
    pub day_number: u32,
    pub poi: String,

    /// "morning", "afternoon", "evening", or "HH:MM-HH:MM"
    pub window: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LunchBreak {
    pub day_number: u32,
}

/// One edit request. Exactly one operation is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditPatch {
    pub replace_stop: Option<ReplaceStop>,
    pub add_stop: Option<AddStop>,
    pub remove_stop: Option<RemoveStop>,
    pub adjust_time: Option<AdjustTime>,
    pub lunch_break: Option<LunchBreak>,
}

impl EditPatch {
    pub fn is_empty(&self) -> bool {
        self.replace_stop.is_none()
            && self.add_stop.is_none()
            && self.remove_stop.is_none()
            && self.adjust_time.is_none()
            && self.lunch_break.is_none()
    }
}

/// Apply a patch to the itinerary, re-time-boxing only the touched day.
/// Returns the action descriptions for the assumptions list.
pub async fn apply_edit(
    itinerary: &mut Itinerary,
    patch: &EditPatch,
    dataset: &PoiDataset,
    scheduler: &Scheduler,
    constraints: &TripConstraints,
    profile: &UserProfile,
    deadline: Deadline,
) -> Result<Vec<String>, PlanError> {
    if patch.is_empty() {
        return Err(PlanError::InputInvalid("empty edit patch".to_string()));
    }

    let mut actions = Vec::new();
    let mut touched_days = Vec::new();

    if let Some(replace) = &patch.replace_stop {
        let day_number = replace.day_number;
        let new_poi = resolve_poi(itinerary, dataset, &replace.new_poi)?;

        let (item_idx, old_name, old_slot) = {
            let day = day_ref(itinerary, day_number)?;
            let idx = match &replace.old_poi {
                Some(old) => find_item(itinerary, day, old)?,
                None => 0,
            };
            let item = day.items.get(idx).ok_or_else(|| {
                PlanError::InputInvalid(format!("day {day_number} has no stop to replace"))
            })?;
            let old_name = itinerary
                .pois
                .get(&item.poi_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| item.poi_id.clone());
            (idx, old_name, item.time_slot)
        };

        itinerary.pois.insert(new_poi.clone());
        let day = itinerary.day_mut(day_number).expect("checked above");
        day.items[item_idx].poi_id = new_poi.id.clone();
        day.items[item_idx].time_slot = old_slot;

        actions.push(format!("day {day_number}: replaced {old_name} with {}", new_poi.name));
        touched_days.push(day_number);
    }

    if let Some(add) = &patch.add_stop {
        let day_number = add.day_number;
        let new_poi = resolve_poi(itinerary, dataset, &add.poi)?;
        day_ref(itinerary, day_number)?;

        if itinerary.used_poi_ids().contains(&new_poi.id) {
            return Err(PlanError::InputInvalid(format!(
                "{} is already part of the plan",
                new_poi.name
            )));
        }

        itinerary.pois.insert(new_poi.clone());
        let day = itinerary.day_mut(day_number).expect("checked above");
        day.items.push(ScheduleItem {
            poi_id: new_poi.id.clone(),
            time_slot: TimeSlot::Afternoon,
            start_time: None,
            end_time: None,
            travel_minutes: 0.0,
            buffer_minutes: 0.0,
            notes: String::new(),
            is_backup: false,
            cluster: String::new(),
        });

        actions.push(format!("day {day_number}: added {}", new_poi.name));
        touched_days.push(day_number);
    }

    if let Some(remove) = &patch.remove_stop {
        let day_number = remove.day_number;
        let item_idx = {
            let day = day_ref(itinerary, day_number)?;
            find_item(itinerary, day, &remove.poi)?
        };

        let day = itinerary.day_mut(day_number).expect("checked above");
        let removed = day.items.remove(item_idx);
        let name = itinerary
            .pois
            .get(&removed.poi_id)
            .map(|p| p.name.clone())
            .unwrap_or(removed.poi_id);

        actions.push(format!("day {day_number}: removed {name}"));
        touched_days.push(day_number);
    }

    if let Some(adjust) = &patch.adjust_time {
        let day_number = adjust.day_number;
        let target = parse_window(&adjust.window).ok_or_else(|| {
            PlanError::InputInvalid(format!("unrecognized time window: {}", adjust.window))
        })?;

        let item_idx = {
            let day = day_ref(itinerary, day_number)?;
            find_item(itinerary, day, &adjust.poi)?
        };

        let day = itinerary.day_mut(day_number).expect("checked above");
        let item = day.items.remove(item_idx);

        // Re-insert where the walk will reach the requested window
        let insert_at = day
            .items
            .iter()
            .position(|existing| existing.start_time.map(|t| t >= target).unwrap_or(false))
            .unwrap_or(day.items.len());
        day.items.insert(insert_at, item);

        actions.push(format!(
            "day {day_number}: moved {} toward {}",
            adjust.poi, adjust.window
        ));
        touched_days.push(day_number);
    }

    if let Some(lunch) = &patch.lunch_break {
        day_ref(itinerary, lunch.day_number)?;
        // Time-boxing inserts the window; the action records the request
        actions.push(format!("day {}: reserved a lunch break", lunch.day_number));
        touched_days.push(lunch.day_number);
    }

    touched_days.sort_unstable();
    touched_days.dedup();
    for day_number in touched_days {
        scheduler
            .retimebox_day(itinerary, day_number, constraints, profile, deadline)
            .await;
    }

    debug!(actions = actions.len(), "edit: patch applied");
    Ok(actions)
}

fn day_ref<'a>(
    itinerary: &'a Itinerary,
    day_number: u32,
) -> Result<&'a crate::domain::ItineraryDay, PlanError> {
    itinerary
        .day(day_number)
        .ok_or_else(|| PlanError::InputInvalid(format!("no day {day_number} in the itinerary")))
}

/// Index of the named POI in a day's schedule
fn find_item(
    itinerary: &Itinerary,
    day: &crate::domain::ItineraryDay,
    name: &str,
) -> Result<usize, PlanError> {
    let key = normalize_name(name);
    day.items
        .iter()
        .position(|item| {
            itinerary
                .pois
                .get(&item.poi_id)
                .map(|p| {
                    let poi_key = normalize_name(&p.name);
                    poi_key == key || poi_key.contains(key.as_str())
                })
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            PlanError::InputInvalid(format!("{} is not on day {}", name, day.day_number))
        })
}

/// Look the POI up in the plan's arena first, then the curated dataset
fn resolve_poi(itinerary: &Itinerary, dataset: &PoiDataset, name: &str) -> Result<Poi, PlanError> {
    if let Some(poi) = itinerary.pois.find_by_name(name) {
        return Ok(poi.clone());
    }

    let key = normalize_name(name);
    dataset
        .lookup(&itinerary.city)
        .iter()
        .find(|p| {
            let poi_key = normalize_name(&p.name);
            poi_key == key || poi_key.contains(key.as_str())
        })
        .cloned()
        .ok_or_else(|| PlanError::InputInvalid(format!("unknown POI: {name}")))
}

fn parse_window(window: &str) -> Option<TimeOfDay> {
    match window.trim().to_lowercase().as_str() {
        "morning" => Some(TimeOfDay::from_hm(9, 0)),
        "noon" | "lunch" => Some(TimeOfDay::from_hm(12, 0)),
        "afternoon" => Some(TimeOfDay::from_hm(14, 0)),
        "evening" => Some(TimeOfDay::from_hm(18, 0)),
        other => {
            let (start, _end) = other.split_once('-')?;
            TimeOfDay::parse(start)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_patch_detected() {
        assert!(EditPatch::default().is_empty());
        let patch = EditPatch {
            lunch_break: Some(LunchBreak { day_number: 1 }),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_patch_deserializes_from_chat_metadata() {
        let json = r#"{"replace_stop": {"day_number": 1, "old_poi": "A", "new_poi": "B"}}"#;
        let patch: EditPatch = serde_json::from_str(json).unwrap();
        let replace = patch.replace_stop.unwrap();
        assert_eq!(replace.day_number, 1);
        assert_eq!(replace.old_poi.as_deref(), Some("A"));
        assert_eq!(replace.new_poi, "B");
    }

    #[test]
    fn test_parse_window() {
        assert_eq!(parse_window("morning"), Some(TimeOfDay::from_hm(9, 0)));
        assert_eq!(parse_window("14:30-16:00"), Some(TimeOfDay::from_hm(14, 30)));
        assert_eq!(parse_window("someday"), None);
    }
}
