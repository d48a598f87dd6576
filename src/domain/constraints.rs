//! Trip constraints and user profile
//!
//! TripConstraints holds the hard requirements extracted by Intake; it is
//! immutable once built. UserProfile carries soft preferences that bias
//! retrieval and scheduling but never fail a plan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How the traveler moves between POIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Walking,
    #[default]
    PublicTransit,
    Taxi,
    Driving,
}

impl TransportMode {
    /// Average speed used for travel-time estimation, in km/h
    pub fn speed_kmh(&self) -> f64 {
        match self {
            Self::Walking => 4.0,
            Self::PublicTransit => 18.0,
            Self::Taxi => 30.0,
            Self::Driving => 40.0,
        }
    }

    /// Geographic clustering radius for day partitioning, in km
    pub fn cluster_radius_km(&self) -> f64 {
        match self {
            Self::Walking => 3.0,
            Self::PublicTransit | Self::Taxi => 5.0,
            Self::Driving => 10.0,
        }
    }

    /// Estimated cost per minute of travel
    pub fn cost_per_minute(&self) -> f64 {
        match self {
            Self::Walking => 0.0,
            Self::PublicTransit => 0.2,
            Self::Taxi => 1.5,
            Self::Driving => 1.0,
        }
    }

    /// Public transit is billed per traveler; taxi and driving are per group
    pub fn cost_is_per_traveler(&self) -> bool {
        matches!(self, Self::PublicTransit)
    }

    /// The next faster mode, if any. Used by the transport-upgrade repair.
    pub fn next_faster(&self) -> Option<Self> {
        match self {
            Self::Walking => Some(Self::PublicTransit),
            Self::PublicTransit => Some(Self::Taxi),
            Self::Taxi => Some(Self::Driving),
            Self::Driving => None,
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Walking => write!(f, "walking"),
            Self::PublicTransit => write!(f, "public_transit"),
            Self::Taxi => write!(f, "taxi"),
            Self::Driving => write!(f, "driving"),
        }
    }
}

/// Trip intensity preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    Relaxed,
    #[default]
    Moderate,
    Intensive,
}

impl Pace {
    /// Candidate-pool sizing multiplier (POIs considered per day)
    pub fn pool_multiplier(&self) -> u32 {
        match self {
            Self::Relaxed => 2,
            Self::Moderate => 3,
            Self::Intensive => 4,
        }
    }

    /// Maximum scheduled POIs per day before PACE_MISMATCH fires
    pub fn max_pois_per_day(&self) -> usize {
        match self {
            Self::Relaxed => 3,
            Self::Moderate => 5,
            Self::Intensive => 8,
        }
    }
}

/// Who is traveling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TravelersType {
    Solo,
    #[default]
    Couple,
    Family,
    Friends,
    Elderly,
}

impl TravelersType {
    /// Default head count when the request does not state one
    pub fn default_count(&self) -> u32 {
        match self {
            Self::Solo => 1,
            Self::Couple | Self::Elderly => 2,
            Self::Family | Self::Friends => 3,
        }
    }
}

/// Hard requirements for a trip. Built by Intake, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripConstraints {
    /// Destination city (required)
    pub city: String,

    /// Trip length in days (required, >= 1)
    pub days: u32,

    /// First day of the trip, when stated
    pub date_start: Option<NaiveDate>,

    /// Last day of the trip, when stated
    pub date_end: Option<NaiveDate>,

    /// Spending ceiling per day, in local currency
    pub daily_budget: Option<f64>,

    pub transport_mode: TransportMode,

    pub pace: Pace,

    /// POI names that must appear in the plan (pinned)
    #[serde(default)]
    pub must_visit: Vec<String>,

    /// POI names excluded from the candidate pool
    #[serde(default)]
    pub avoid: Vec<String>,

    /// Explicit head count; falls back to the profile's travelers_type
    pub travelers_count: Option<u32>,
}

impl TripConstraints {
    pub fn new(city: impl Into<String>, days: u32) -> Self {
        Self {
            city: city.into(),
            days: days.max(1),
            date_start: None,
            date_end: None,
            daily_budget: None,
            transport_mode: TransportMode::default(),
            pace: Pace::default(),
            must_visit: Vec::new(),
            avoid: Vec::new(),
            travelers_count: None,
        }
    }

    /// Total budget over the whole trip, if a daily budget was given
    pub fn total_budget(&self) -> Option<f64> {
        self.daily_budget.map(|b| b * self.days as f64)
    }

    /// The calendar date of a 1-based trip day, when dates are known
    pub fn date_of_day(&self, day_number: u32) -> Option<NaiveDate> {
        let start = self.date_start?;
        start.checked_add_days(chrono::Days::new(u64::from(day_number.saturating_sub(1))))
    }

    pub fn resolve_travelers_count(&self, profile: &UserProfile) -> u32 {
        match self.travelers_count {
            Some(n) if n > 0 => n,
            _ => profile.travelers_type.default_count(),
        }
    }
}

/// Soft preferences. Missing values mean "no preference".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub travelers_type: TravelersType,

    /// Preferred themes, most important first
    pub themes: Vec<String>,

    /// Dietary restrictions, e.g. "vegetarian", "halal"
    pub dietary: Vec<String>,

    /// Mobility limits, e.g. "no stairs", "short walks only"
    pub mobility_limits: Vec<String>,
}
