//! Point-of-interest model and the POI arena
//!
//! Every fact on a POI is tagged with its provenance in `fact_sources`.
//! Schedule items reference POIs by id; the owning arena travels with the
//! itinerary so serialized plans stay self-contained.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Provenance tier for a single POI fact.
///
/// Ranked: verified > curated > heuristic > fallback > unknown. Fusion keeps
/// the highest-ranked source per attribute and never downgrades a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Verified,
    Curated,
    Heuristic,
    Fallback,
    #[default]
    Unknown,
}

impl SourceType {
    /// Fusion rank; higher wins when merging the same attribute
    pub fn rank(&self) -> u8 {
        match self {
            Self::Verified => 4,
            Self::Curated => 3,
            Self::Heuristic => 2,
            Self::Fallback => 1,
            Self::Unknown => 0,
        }
    }

    /// Verified and curated facts count toward the verified-fact ratio
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Verified | Self::Curated)
    }
}

/// Fact fields that feed the trust layer's confidence computation
pub const CRITICAL_FACT_FIELDS: [&str; 4] =
    ["ticket_price", "reservation_required", "open_hours", "closed_rules"];

/// A visitable place. Immutable once it enters the candidate pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: String,
    pub name: String,
    pub city: String,
    pub lat: f64,
    pub lon: f64,

    #[serde(default)]
    pub themes: Vec<String>,

    /// Typical visit duration in hours
    pub duration_hours: f64,

    /// Generic per-person cost (ticket unless stated otherwise)
    #[serde(default)]
    pub cost: f64,

    #[serde(default)]
    pub indoor: bool,

    #[serde(default)]
    pub ticket_price: f64,

    #[serde(default)]
    pub reservation_required: bool,

    /// Weekdays the POI is closed, 0 = Monday .. 6 = Sunday
    #[serde(default)]
    pub closed_weekdays: Vec<u8>,

    /// Free-text closure note shown to the user
    #[serde(default)]
    pub closed_rules: String,

    /// Opening window as "HH:MM-HH:MM", when known
    #[serde(default)]
    pub open_hours: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Relative popularity in [0, 1], used by ranking
    #[serde(default)]
    pub popularity: f64,

    /// Must-visit POIs are pinned: repair never drops them
    #[serde(default)]
    pub pinned: bool,

    /// Per-attribute provenance
    #[serde(default)]
    pub fact_sources: BTreeMap<String, SourceType>,
}

impl Poi {
    /// Effective per-person ticket cost
    pub fn effective_ticket(&self) -> f64 {
        self.ticket_price.max(self.cost).max(0.0)
    }

    /// Whether the POI is open on the given date
    pub fn is_open_on(&self, date: chrono::NaiveDate) -> bool {
        use chrono::Datelike;
        let weekday = date.weekday().num_days_from_monday() as u8;
        !self.closed_weekdays.contains(&weekday)
    }

    /// Whether any theme matches (case-insensitive) one of the given themes
    pub fn matches_any_theme(&self, themes: &[String]) -> bool {
        self.themes.iter().any(|t| {
            themes
                .iter()
                .any(|wanted| t.eq_ignore_ascii_case(wanted))
        })
    }

    /// Count of themes shared with the given preference list
    pub fn theme_overlap(&self, themes: &[String]) -> usize {
        self.themes
            .iter()
            .filter(|t| themes.iter().any(|wanted| t.eq_ignore_ascii_case(wanted)))
            .count()
    }

    /// Provenance of one attribute, Unknown when untagged
    pub fn fact_source(&self, field: &str) -> SourceType {
        self.fact_sources.get(field).copied().unwrap_or_default()
    }

    /// Tag an attribute's provenance, refusing to downgrade
    pub fn tag_fact(&mut self, field: &str, source: SourceType) {
        let current = self.fact_source(field);
        if source.rank() >= current.rank() {
            self.fact_sources.insert(field.to_string(), source);
        }
    }

    /// Tag every critical fact field with the same provenance (no downgrades)
    pub fn tag_all_facts(&mut self, source: SourceType) {
        for field in CRITICAL_FACT_FIELDS {
            self.tag_fact(field, source);
        }
    }
}

/// Normalize a POI name for dedup: lowercase, alphanumeric only
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// POIs shared read-only across the pipeline, indexed by id.
///
/// Schedule items hold ids instead of POI values; the arena is embedded in
/// the itinerary so a serialized plan round-trips without external lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoiArena {
    pois: BTreeMap<String, Poi>,
}

impl PoiArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, poi: Poi) {
        self.pois.insert(poi.id.clone(), poi);
    }

    pub fn get(&self, id: &str) -> Option<&Poi> {
        self.pois.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Poi> {
        self.pois.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pois.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Poi> {
        self.pois.values()
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    /// Find a POI by exact or normalized name
    pub fn find_by_name(&self, name: &str) -> Option<&Poi> {
        let normalized = normalize_name(name);
        self.pois
            .values()
            .find(|p| p.name == name || normalize_name(&p.name) == normalized)
    }
}

impl FromIterator<Poi> for PoiArena {
    fn from_iter<T: IntoIterator<Item = Poi>>(iter: T) -> Self {
        let mut arena = Self::new();
        for poi in iter {
            arena.insert(poi);
        }
        arena
    }
}
