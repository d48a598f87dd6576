//! Domain types for TripAgent
//!
//! Core value types: TripConstraints, UserProfile, Poi, Itinerary, Issue,
//! RunFingerprint. All are plain serde values; stages exchange them by value
//! and mutations produce new states.

mod constraints;
mod fingerprint;
mod issue;
mod itinerary;
mod poi;

pub use constraints::{Pace, TransportMode, TravelersType, TripConstraints, UserProfile};
pub use fingerprint::{RunFingerprint, RunMode};
pub use issue::{severity_weighted_sum, Issue, IssueCode, Severity};
pub use itinerary::{
    BudgetBreakdown, DegradeLevel, Itinerary, ItineraryDay, ScheduleItem, TimeOfDay, TimeSlot,
};
pub use poi::{normalize_name, Poi, PoiArena, SourceType, CRITICAL_FACT_FIELDS};
