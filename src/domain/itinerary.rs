//! Itinerary structure: days, schedule items, budget breakdown
//!
//! Times are minutes since midnight, serialized as "HH:MM". Day invariants:
//! items sorted by start time, `end[i] + travel[i+1] <= start[i+1]`, and no
//! POI appears twice anywhere in the trip.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::constraints::TransportMode;
use super::issue::Issue;
use super::poi::PoiArena;

/// Minutes since midnight, serialized as "HH:MM"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(pub u16);

impl TimeOfDay {
    pub fn from_hm(hour: u16, minute: u16) -> Self {
        Self(hour * 60 + minute)
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    pub fn hour(&self) -> u16 {
        self.0 / 60
    }

    pub fn minute(&self) -> u16 {
        self.0 % 60
    }

    /// Saturating add, capped at 23:59
    pub fn plus_minutes(&self, minutes: f64) -> Self {
        let total = f64::from(self.0) + minutes.max(0.0);
        Self((total.round() as u16).min(23 * 60 + 59))
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (h, m) = text.trim().split_once(':')?;
        let hour: u16 = h.parse().ok()?;
        let minute: u16 = m.parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self::from_hm(hour, minute))
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).ok_or_else(|| serde::de::Error::custom(format!("invalid time: {text}")))
    }
}

/// Coarse part of day a visit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Lunch,
    Afternoon,
    Dinner,
    Evening,
}

impl TimeSlot {
    /// Slot for a given start time
    pub fn for_time(time: TimeOfDay) -> Self {
        match time.minutes() {
            m if m < 11 * 60 + 30 => Self::Morning,
            m if m < 13 * 60 + 30 => Self::Lunch,
            m if m < 17 * 60 + 30 => Self::Afternoon,
            m if m < 19 * 60 + 30 => Self::Dinner,
            _ => Self::Evening,
        }
    }
}

/// One visit in a day. References its POI by arena id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub poi_id: String,
    pub time_slot: TimeSlot,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,

    /// Travel from the previous item; 0 for the first item of a day
    pub travel_minutes: f64,

    /// Security/queueing buffer absorbed before the visit starts
    #[serde(default)]
    pub buffer_minutes: f64,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub is_backup: bool,

    /// Geographic cluster the scheduler placed this POI in
    #[serde(default)]
    pub cluster: String,
}

impl ScheduleItem {
    pub fn backup(poi_id: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            poi_id: poi_id.into(),
            time_slot: TimeSlot::Afternoon,
            start_time: None,
            end_time: None,
            travel_minutes: 0.0,
            buffer_minutes: 0.0,
            notes: notes.into(),
            is_backup: true,
            cluster: String::new(),
        }
    }
}

/// One day of the trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    pub day_number: u32,
    pub date: Option<NaiveDate>,

    /// Scheduled visits, sorted by start time
    pub items: Vec<ScheduleItem>,

    /// Alternatives for rain or crowding; never counted in cost or time
    #[serde(default)]
    pub backups: Vec<ScheduleItem>,

    #[serde(default)]
    pub day_summary: String,

    #[serde(default)]
    pub meal_windows: Vec<String>,

    pub estimated_cost: f64,
    pub total_travel_minutes: f64,

    /// Per-day transport override from the upgrade-transport repair
    pub transport_mode: Option<TransportMode>,
}

impl ItineraryDay {
    pub fn new(day_number: u32, date: Option<NaiveDate>) -> Self {
        Self {
            day_number,
            date,
            ..Default::default()
        }
    }

    /// Wall-clock span from first start to last end, in minutes
    pub fn wall_clock_minutes(&self) -> f64 {
        let first = self.items.iter().filter_map(|i| i.start_time).min();
        let last = self.items.iter().filter_map(|i| i.end_time).max();
        match (first, last) {
            (Some(start), Some(end)) if end > start => f64::from(end.minutes() - start.minutes()),
            _ => 0.0,
        }
    }

    pub fn travel_minutes(&self) -> f64 {
        self.items.iter().map(|i| i.travel_minutes).sum()
    }

    /// Distinct-cluster transitions while walking the day in order
    pub fn cluster_switches(&self) -> usize {
        let clusters: Vec<&str> = self
            .items
            .iter()
            .filter(|i| !i.cluster.is_empty())
            .map(|i| i.cluster.as_str())
            .collect();
        clusters.windows(2).filter(|w| w[0] != w[1]).count()
    }
}

/// How far the produced plan is from a fully verified realtime result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum DegradeLevel {
    #[default]
    L0,
    L1,
    L2,
    L3,
}

impl DegradeLevel {
    /// One step worse, saturating at L3
    pub fn elevated(&self) -> Self {
        match self {
            Self::L0 => Self::L1,
            Self::L1 => Self::L2,
            Self::L2 | Self::L3 => Self::L3,
        }
    }

    pub fn from_steps(steps: u32) -> Self {
        match steps {
            0 => Self::L0,
            1 => Self::L1,
            2 => Self::L2,
            _ => Self::L3,
        }
    }
}

impl std::fmt::Display for DegradeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L0 => write!(f, "L0"),
            Self::L1 => write!(f, "L1"),
            Self::L2 => write!(f, "L2"),
            Self::L3 => write!(f, "L3"),
        }
    }
}

/// Cost components of a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetBreakdown {
    pub tickets: f64,
    pub local_transport: f64,
    pub food_min: f64,
}

impl BudgetBreakdown {
    pub fn total(&self) -> f64 {
        self.tickets + self.local_transport + self.food_min
    }
}

/// A complete multi-day plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub city: String,
    pub days: Vec<ItineraryDay>,

    /// POIs referenced by schedule items, embedded for round-trip closure
    #[serde(default)]
    pub pois: PoiArena,

    pub total_cost: f64,

    #[serde(default)]
    pub assumptions: Vec<String>,

    #[serde(default)]
    pub budget_breakdown: BudgetBreakdown,

    pub minimum_feasible_budget: f64,

    /// Set when the stated budget sits below the minimum feasible one
    pub budget_warning: Option<String>,

    pub confidence_score: f64,
    pub degrade_level: DegradeLevel,

    /// Issues left unresolved after repair
    #[serde(default)]
    pub issues: Vec<Issue>,

    /// Mean routing confidence over all legs, in [0, 1]
    #[serde(default)]
    pub routing_confidence: f64,

    #[serde(default)]
    pub summary: String,
}

impl Itinerary {
    /// All scheduled (non-backup) items across all days
    pub fn scheduled_items(&self) -> impl Iterator<Item = (&ItineraryDay, &ScheduleItem)> {
        self.days
            .iter()
            .flat_map(|d| d.items.iter().map(move |i| (d, i)))
    }

    /// POI ids already used in the schedule (main items and backups)
    pub fn used_poi_ids(&self) -> std::collections::HashSet<String> {
        self.days
            .iter()
            .flat_map(|d| d.items.iter().chain(d.backups.iter()))
            .map(|i| i.poi_id.clone())
            .collect()
    }

    pub fn day_mut(&mut self, day_number: u32) -> Option<&mut ItineraryDay> {
        self.days.iter_mut().find(|d| d.day_number == day_number)
    }

    pub fn day(&self, day_number: u32) -> Option<&ItineraryDay> {
        self.days.iter().find(|d| d.day_number == day_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_display_and_parse() {
        let t = TimeOfDay::from_hm(9, 5);
        assert_eq!(t.to_string(), "09:05");
        assert_eq!(TimeOfDay::parse("09:05"), Some(t));
        assert_eq!(TimeOfDay::parse("24:00"), None);
        assert_eq!(TimeOfDay::parse("garbage"), None);
    }

    #[test]
    fn test_time_of_day_serde() {
        let t = TimeOfDay::from_hm(21, 0);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"21:00\"");
        let back: TimeOfDay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_time_slot_boundaries() {
        assert_eq!(TimeSlot::for_time(TimeOfDay::from_hm(9, 0)), TimeSlot::Morning);
        assert_eq!(TimeSlot::for_time(TimeOfDay::from_hm(11, 30)), TimeSlot::Lunch);
        assert_eq!(TimeSlot::for_time(TimeOfDay::from_hm(14, 0)), TimeSlot::Afternoon);
        assert_eq!(TimeSlot::for_time(TimeOfDay::from_hm(18, 0)), TimeSlot::Dinner);
        assert_eq!(TimeSlot::for_time(TimeOfDay::from_hm(20, 0)), TimeSlot::Evening);
    }

    #[test]
    fn test_day_wall_clock() {
        let mut day = ItineraryDay::new(1, None);
        day.items.push(ScheduleItem {
            poi_id: "a".to_string(),
            time_slot: TimeSlot::Morning,
            start_time: Some(TimeOfDay::from_hm(9, 0)),
            end_time: Some(TimeOfDay::from_hm(11, 0)),
            travel_minutes: 0.0,
            buffer_minutes: 0.0,
            notes: String::new(),
            is_backup: false,
            cluster: "geo:1".to_string(),
        });
        day.items.push(ScheduleItem {
            poi_id: "b".to_string(),
            time_slot: TimeSlot::Afternoon,
            start_time: Some(TimeOfDay::from_hm(14, 0)),
            end_time: Some(TimeOfDay::from_hm(16, 30)),
            travel_minutes: 25.0,
            buffer_minutes: 0.0,
            notes: String::new(),
            is_backup: false,
            cluster: "geo:2".to_string(),
        });

        assert_eq!(day.wall_clock_minutes(), 450.0);
        assert_eq!(day.travel_minutes(), 25.0);
        assert_eq!(day.cluster_switches(), 1);
    }

    #[test]
    fn test_degrade_elevation_saturates() {
        assert_eq!(DegradeLevel::L0.elevated(), DegradeLevel::L1);
        assert_eq!(DegradeLevel::L3.elevated(), DegradeLevel::L3);
        assert_eq!(DegradeLevel::from_steps(7), DegradeLevel::L3);
        assert!(DegradeLevel::L2 > DegradeLevel::L1);
    }

    #[test]
    fn test_itinerary_round_trip() {
        let mut itinerary = Itinerary {
            city: "Beijing".to_string(),
            ..Default::default()
        };
        itinerary.days.push(ItineraryDay::new(1, None));
        itinerary.budget_breakdown = BudgetBreakdown {
            tickets: 120.0,
            local_transport: 36.0,
            food_min: 240.0,
        };
        itinerary.total_cost = itinerary.budget_breakdown.total();

        let json = serde_json::to_string(&itinerary).unwrap();
        let back: Itinerary = serde_json::from_str(&json).unwrap();
        assert_eq!(itinerary, back);
    }
}
