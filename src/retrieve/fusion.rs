//! Provenance-ranked fact fusion
//!
//! POIs from different sources are deduplicated by normalized name. For each
//! attribute the highest-ranked provenance wins; a verified fact is never
//! replaced by a curated or heuristic one. Total and deterministic: input
//! order only breaks exact rank ties, and the source ladder feeds candidates
//! in a fixed order.

use std::collections::HashMap;

use crate::domain::{normalize_name, Poi, SourceType};

/// Merge candidate lists from multiple sources, earlier lists first.
///
/// The first occurrence of a name becomes the base record; later duplicates
/// contribute themes and any higher-provenance facts.
pub fn merge_candidates(source_lists: Vec<Vec<Poi>>) -> Vec<Poi> {
    let mut merged: Vec<Poi> = Vec::new();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for list in source_lists {
        for poi in list {
            let key = normalize_name(&poi.name);
            match index_by_name.get(&key) {
                Some(&idx) => fuse_into(&mut merged[idx], poi),
                None => {
                    index_by_name.insert(key, merged.len());
                    merged.push(poi);
                }
            }
        }
    }
    merged
}

/// Fold `other` into `base`, attribute by attribute
fn fuse_into(base: &mut Poi, other: Poi) {
    // Union themes
    for theme in &other.themes {
        if !base.themes.iter().any(|t| t.eq_ignore_ascii_case(theme)) {
            base.themes.push(theme.clone());
        }
    }

    // Critical facts move only when the other source outranks the base
    if outranks(&other, base, "ticket_price") {
        base.ticket_price = other.ticket_price;
        base.cost = other.cost.max(other.ticket_price);
        base.tag_fact("ticket_price", other.fact_source("ticket_price"));
    }
    if outranks(&other, base, "reservation_required") {
        base.reservation_required = other.reservation_required;
        base.tag_fact("reservation_required", other.fact_source("reservation_required"));
    }
    if outranks(&other, base, "open_hours") {
        if other.open_hours.is_some() {
            base.open_hours = other.open_hours.clone();
        }
        base.tag_fact("open_hours", other.fact_source("open_hours"));
    }
    if outranks(&other, base, "closed_rules") {
        base.closed_weekdays = other.closed_weekdays.clone();
        base.closed_rules = other.closed_rules.clone();
        base.tag_fact("closed_rules", other.fact_source("closed_rules"));
    }

    // Softer attributes: keep the richer value
    if base.description.is_empty() && !other.description.is_empty() {
        base.description = other.description;
    }
    base.popularity = base.popularity.max(other.popularity);
    base.pinned = base.pinned || other.pinned;
}

fn outranks(other: &Poi, base: &Poi, field: &str) -> bool {
    other.fact_source(field).rank() > base.fact_source(field).rank()
}

/// Tag every critical fact of a generated POI as heuristic
pub fn tag_heuristic(mut poi: Poi) -> Poi {
    poi.tag_all_facts(SourceType::Heuristic);
    poi
}
