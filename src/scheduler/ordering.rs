//! Intra-day ordering
//!
//! Phase 2: greedy nearest-neighbor walk. The anchor is the day's first
//! pinned POI; with no pin, the outermost northwest point, which starts the
//! walk at the geographic edge instead of the middle.

use crate::domain::Poi;

use super::distance::poi_distance_km;

/// Order a day's POIs greedily by nearest neighbor
pub fn nearest_neighbor_order(pois: &[Poi], day_members: &[usize]) -> Vec<usize> {
    if day_members.is_empty() {
        return Vec::new();
    }

    let anchor = day_members
        .iter()
        .position(|&i| pois[i].pinned)
        .unwrap_or_else(|| northwest_most(pois, day_members));

    let mut remaining: Vec<usize> = day_members.to_vec();
    let mut ordered = vec![remaining.remove(anchor)];

    while !remaining.is_empty() {
        let current = *ordered.last().expect("ordered non-empty");
        let next_pos = remaining
            .iter()
            .enumerate()
            .min_by(|(_, &a), (_, &b)| {
                let da = poi_distance_km(&pois[current], &pois[a]);
                let db = poi_distance_km(&pois[current], &pois[b]);
                da.partial_cmp(&db)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| pois[a].name.cmp(&pois[b].name))
            })
            .map(|(pos, _)| pos)
            .expect("remaining non-empty");
        ordered.push(remaining.remove(next_pos));
    }

    ordered
}

/// Position (within `day_members`) of the most northwesterly POI
fn northwest_most(pois: &[Poi], day_members: &[usize]) -> usize {
    day_members
        .iter()
        .enumerate()
        .max_by(|(_, &a), (_, &b)| {
            let score_a = pois[a].lat - pois[a].lon;
            let score_b = pois[b].lat - pois[b].lon;
            score_a
                .partial_cmp(&score_b)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(pos, _)| pos)
        .unwrap_or(0)
}
