//! Geographic day partitioning
//!
//! Phase 1 of scheduling: single-link clustering with a transport-dependent
//! radius, then duration-weighted assignment of clusters to days. Single-link
//! with a fixed radius is exactly the connected components of the
//! within-radius graph, so a union-find does the whole job.

use std::collections::HashMap;

use crate::domain::{Poi, TransportMode};

use super::distance::poi_crow_km;

/// A geographic cluster of pool indices
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: String,
    pub members: Vec<usize>,
    pub total_duration_hours: f64,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower root wins, keeping cluster identity deterministic
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Single-link clusters over the pool at the mode's radius
pub fn single_link_clusters(pois: &[Poi], mode: TransportMode) -> Vec<Cluster> {
    let radius_km = mode.cluster_radius_km();
    let mut uf = UnionFind::new(pois.len());

    for i in 0..pois.len() {
        for j in (i + 1)..pois.len() {
            if poi_crow_km(&pois[i], &pois[j]) <= radius_km {
                uf.union(i, j);
            }
        }
    }

    let mut members_by_root: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..pois.len() {
        let root = uf.find(i);
        members_by_root.entry(root).or_default().push(i);
    }

    let mut roots: Vec<usize> = members_by_root.keys().copied().collect();
    roots.sort_unstable();

    roots
        .into_iter()
        .enumerate()
        .map(|(cluster_no, root)| {
            let members = members_by_root.remove(&root).expect("root present");
            let total_duration_hours = members.iter().map(|&i| pois[i].duration_hours).sum();
            Cluster {
                id: format!("geo:{}", cluster_no + 1),
                members,
                total_duration_hours,
            }
        })
        .collect()
}

/// Day assignment limits
#[derive(Debug, Clone, Copy)]
pub struct DayCapacity {
    /// Activity-hours budget per day
    pub hours: f64,
    /// Hard cap on scheduled POIs per day
    pub max_pois: usize,
}

/// Assign clusters to days, heaviest cluster first, always onto the
/// least-loaded day. POIs that fit nowhere are returned as leftovers and
/// feed the backup lists.
pub fn assign_clusters_to_days(
    pois: &[Poi],
    clusters: Vec<Cluster>,
    days: u32,
    capacity: DayCapacity,
) -> (Vec<Vec<usize>>, Vec<usize>) {
    let day_count = days.max(1) as usize;
    let mut day_members: Vec<Vec<usize>> = vec![Vec::new(); day_count];
    let mut day_hours: Vec<f64> = vec![0.0; day_count];
    let mut leftovers: Vec<usize> = Vec::new();

    let mut ordered = clusters;
    ordered.sort_by(|a, b| {
        b.total_duration_hours
            .partial_cmp(&a.total_duration_hours)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    for cluster in ordered {
        let day = least_loaded_day(&day_hours);

        // Pinned members first so must-visits survive a tight day
        let mut members = cluster.members;
        members.sort_by_key(|&i| (!pois[i].pinned, i));

        for poi_idx in members {
            let duration = pois[poi_idx].duration_hours;
            let fits_here = day_hours[day] + duration <= capacity.hours
                && day_members[day].len() < capacity.max_pois;

            if fits_here {
                day_members[day].push(poi_idx);
                day_hours[day] += duration;
                continue;
            }

            // Spill to any other day with room
            let spill = (0..day_count)
                .filter(|&d| d != day)
                .find(|&d| {
                    day_hours[d] + duration <= capacity.hours && day_members[d].len() < capacity.max_pois
                });
            match spill {
                Some(d) => {
                    day_members[d].push(poi_idx);
                    day_hours[d] += duration;
                }
                None => leftovers.push(poi_idx),
            }
        }
    }

    (day_members, leftovers)
}

fn least_loaded_day(day_hours: &[f64]) -> usize {
    day_hours
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Cluster id per POI id, for stamping schedule items
pub fn cluster_lookup(pois: &[Poi], clusters: &[Cluster]) -> HashMap<String, String> {
    let mut lookup = HashMap::new();
    for cluster in clusters {
        for &idx in &cluster.members {
            lookup.insert(pois[idx].id.clone(), cluster.id.clone());
        }
    }
    lookup
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi_at(id: &str, lat: f64, lon: f64, hours: f64) -> Poi {
        Poi {
            id: id.to_string(),
            name: id.to_string(),
            city: "Test".to_string(),
            lat,
            lon,
            themes: vec![],
            duration_hours: hours,
            cost: 0.0,
            indoor: false,
            ticket_price: 0.0,
            reservation_required: false,
            closed_weekdays: vec![],
            closed_rules: String::new(),
            open_hours: None,
            description: String::new(),
            popularity: 0.5,
            pinned: false,
            fact_sources: Default::default(),
        }
    }

    #[test]
    fn test_nearby_pois_share_cluster() {
        // Two POIs ~1.2km apart, one ~40km away
        let pois = vec![
            poi_at("a", 39.90, 116.40, 2.0),
            poi_at("b", 39.91, 116.40, 2.0),
            poi_at("c", 40.25, 116.40, 2.0),
        ];

        let clusters = single_link_clusters(&pois, TransportMode::PublicTransit);
        assert_eq!(clusters.len(), 2);
        let big = clusters.iter().find(|c| c.members.len() == 2).unwrap();
        assert!(big.members.contains(&0) && big.members.contains(&1));
    }

    #[test]
    fn test_walking_radius_is_tighter() {
        // ~4km apart: together for transit (5km), separate for walking (3km)
        let pois = vec![poi_at("a", 39.90, 116.40, 1.0), poi_at("b", 39.936, 116.40, 1.0)];

        assert_eq!(single_link_clusters(&pois, TransportMode::PublicTransit).len(), 1);
        assert_eq!(single_link_clusters(&pois, TransportMode::Walking).len(), 2);
    }

    #[test]
    fn test_chained_pois_link_transitively() {
        // a-b and b-c within radius, a-c not: single-link joins all three
        let pois = vec![
            poi_at("a", 39.90, 116.40, 1.0),
            poi_at("b", 39.93, 116.40, 1.0),
            poi_at("c", 39.96, 116.40, 1.0),
        ];
        let clusters = single_link_clusters(&pois, TransportMode::PublicTransit);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
    }

    #[test]
    fn test_day_assignment_balances_duration() {
        let pois = vec![
            poi_at("a", 39.90, 116.40, 3.0),
            poi_at("b", 39.905, 116.40, 3.0),
            poi_at("c", 31.23, 121.47, 3.0),
            poi_at("d", 31.235, 121.47, 3.0),
        ];
        let clusters = single_link_clusters(&pois, TransportMode::PublicTransit);
        let (days, leftovers) = assign_clusters_to_days(
            &pois,
            clusters,
            2,
            DayCapacity {
                hours: 8.0,
                max_pois: 5,
            },
        );

        assert!(leftovers.is_empty());
        assert_eq!(days[0].len(), 2);
        assert_eq!(days[1].len(), 2);
    }

    #[test]
    fn test_capacity_overflow_spills_to_leftovers() {
        let pois: Vec<Poi> = (0..6)
            .map(|i| poi_at(&format!("p{i}"), 39.90 + 0.001 * i as f64, 116.40, 3.0))
            .collect();
        let clusters = single_link_clusters(&pois, TransportMode::PublicTransit);
        let (days, leftovers) = assign_clusters_to_days(
            &pois,
            clusters,
            1,
            DayCapacity {
                hours: 8.0,
                max_pois: 5,
            },
        );

        // One day of 8h holds at most two 3h POIs
        assert_eq!(days[0].len(), 2);
        assert_eq!(leftovers.len(), 4);
    }

    #[test]
    fn test_cluster_lookup_maps_all_members() {
        let pois = vec![poi_at("a", 39.90, 116.40, 1.0), poi_at("b", 39.905, 116.40, 1.0)];
        let clusters = single_link_clusters(&pois, TransportMode::PublicTransit);
        let lookup = cluster_lookup(&pois, &clusters);
        assert_eq!(lookup.get("a"), lookup.get("b"));
        assert!(lookup.get("a").unwrap().starts_with("geo:"));
    }
}
