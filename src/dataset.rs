//! Curated POI dataset
//!
//! A JSON array of POIs with per-field provenance tags. Loaded once at
//! startup and shared read-only. The embedded dataset keeps the pipeline
//! runnable with no files or network at all.

use std::collections::HashMap;
use std::path::Path;

use eyre::{Context, Result};
use tracing::info;

use crate::domain::{Poi, SourceType};

/// Dataset bundled into the binary
const EMBEDDED_DATASET: &str = include_str!("../data/poi_dataset.json");

/// City-indexed curated POIs, read-only after startup
pub struct PoiDataset {
    by_city: HashMap<String, Vec<Poi>>,
}

impl PoiDataset {
    /// Load the embedded dataset
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_DATASET).context("Failed to parse embedded POI dataset")
    }

    /// Load a dataset file, JSON array of POI entries
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).context("Failed to read POI dataset file")?;
        let dataset = Self::from_json(&content)
            .context(format!("Failed to parse POI dataset {}", path.as_ref().display()))?;
        info!(path = %path.as_ref().display(), cities = dataset.by_city.len(), "Loaded POI dataset");
        Ok(dataset)
    }

    fn from_json(content: &str) -> Result<Self> {
        let pois: Vec<Poi> = serde_json::from_str(content)?;

        let mut by_city: HashMap<String, Vec<Poi>> = HashMap::new();
        for mut poi in pois {
            eyre::ensure!(!poi.id.is_empty(), "POI entry missing id");
            eyre::ensure!(!poi.name.is_empty(), "POI {} missing name", poi.id);
            eyre::ensure!(poi.duration_hours > 0.0, "POI {} has no duration", poi.id);

            // Untagged fields on curated entries are curated by construction
            for field in crate::domain::CRITICAL_FACT_FIELDS {
                if !poi.fact_sources.contains_key(field) {
                    poi.fact_sources.insert(field.to_string(), SourceType::Curated);
                }
            }

            by_city.entry(normalize_city(&poi.city)).or_default().push(poi);
        }

        Ok(Self { by_city })
    }

    /// POIs for a city, exact match on the normalized name
    pub fn lookup(&self, city: &str) -> &[Poi] {
        self.by_city
            .get(&normalize_city(city))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Display-cased city names known to the dataset
    pub fn known_cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = self
            .by_city
            .values()
            .filter_map(|pois| pois.first().map(|p| p.city.clone()))
            .collect();
        cities.sort();
        cities
    }

    pub fn total_pois(&self) -> usize {
        self.by_city.values().map(Vec::len).sum()
    }
}

fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}
