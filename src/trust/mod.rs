//! Trust layer: provenance accounting and confidence scoring
//!
//! Every critical fact on a scheduled POI carries a provenance tier. The
//! trust pass computes the verified-fact ratio and fallback rate over those
//! tiers, folds in routing confidence, and maps the result to a degrade
//! level. Provenance only ever moves up: a verified fact stays verified
//! through fusion, scheduling, and repair.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    DegradeLevel, Itinerary, RunFingerprint, RunMode, CRITICAL_FACT_FIELDS,
};

/// Confidence weights: verified facts, non-fallback share, routing
const WEIGHT_VERIFIED: f64 = 0.6;
const WEIGHT_NON_FALLBACK: f64 = 0.3;
const WEIGHT_ROUTING: f64 = 0.1;

/// Provenance tallies over the scheduled POIs' critical facts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustSummary {
    pub total_facts: u32,
    pub trusted_facts: u32,
    pub fallback_facts: u32,
    pub verified_fact_ratio: f64,
    pub fallback_rate: f64,
    pub confidence_score: f64,
    pub degrade_level: DegradeLevel,
}

/// Tally provenance over every critical fact of every scheduled POI
pub fn tally_facts(itinerary: &Itinerary) -> (u32, u32, u32) {
    let mut total = 0u32;
    let mut trusted = 0u32;
    let mut fallback = 0u32;

    for (_day, item) in itinerary.scheduled_items() {
        let Some(poi) = itinerary.pois.get(&item.poi_id) else {
            continue;
        };
        for field in CRITICAL_FACT_FIELDS {
            total += 1;
            let source = poi.fact_source(field);
            if source.is_trusted() {
                trusted += 1;
            }
            if source == crate::domain::SourceType::Fallback {
                fallback += 1;
            }
        }
    }
    (total, trusted, fallback)
}

/// `clamp(0.6*vfr + 0.3*(1 - fallback_rate) + 0.1*routing, 0, 1)`
pub fn confidence_score(verified_fact_ratio: f64, fallback_rate: f64, routing_confidence: f64) -> f64 {
    let score = WEIGHT_VERIFIED * verified_fact_ratio
        + WEIGHT_NON_FALLBACK * (1.0 - fallback_rate)
        + WEIGHT_ROUTING * routing_confidence;
    score.clamp(0.0, 1.0)
}

/// Degrade ladder: L0 needs realtime providers and high confidence
pub fn degrade_level(confidence: f64, run_mode: RunMode) -> DegradeLevel {
    if run_mode == RunMode::Realtime && confidence >= 0.85 {
        DegradeLevel::L0
    } else if confidence >= 0.7 {
        DegradeLevel::L1
    } else if confidence >= 0.5 {
        DegradeLevel::L2
    } else {
        DegradeLevel::L3
    }
}

/// Compute the trust summary for a finished itinerary
pub fn assess(itinerary: &Itinerary, run_mode: RunMode) -> TrustSummary {
    let (total, trusted, fallback) = tally_facts(itinerary);
    let verified_fact_ratio = if total > 0 {
        f64::from(trusted) / f64::from(total)
    } else {
        0.0
    };
    let fallback_rate = if total > 0 {
        f64::from(fallback) / f64::from(total)
    } else {
        0.0
    };

    let confidence = confidence_score(verified_fact_ratio, fallback_rate, itinerary.routing_confidence);
    let summary = TrustSummary {
        total_facts: total,
        trusted_facts: trusted,
        fallback_facts: fallback,
        verified_fact_ratio,
        fallback_rate,
        confidence_score: confidence,
        degrade_level: degrade_level(confidence, run_mode),
    };
    debug!(?summary, "trust: assessed");
    summary
}

/// Assemble the run fingerprint for a response
pub fn build_fingerprint(
    poi_provider: &str,
    route_provider: &str,
    llm_provider: &str,
    strict_external_data: bool,
    env_source: &str,
    trace_id: &str,
) -> RunFingerprint {
    RunFingerprint {
        run_mode: RunFingerprint::compute_run_mode(poi_provider, route_provider, llm_provider),
        poi_provider: poi_provider.to_string(),
        route_provider: route_provider.to_string(),
        llm_provider: llm_provider.to_string(),
        strict_external_data,
        env_source: env_source.to_string(),
        trace_id: trace_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItineraryDay, Poi, PoiArena, ScheduleItem, SourceType, TimeSlot};

    fn poi_with_sources(id: &str, source: SourceType) -> Poi {
        let mut poi = Poi {
            id: id.to_string(),
            name: id.to_string(),
            city: "Test".to_string(),
            lat: 0.0,
            lon: 0.0,
            themes: vec![],
            duration_hours: 1.0,
            cost: 0.0,
            indoor: false,
            ticket_price: 0.0,
            reservation_required: false,
            closed_weekdays: vec![],
            closed_rules: String::new(),
            open_hours: Some("09:00-18:00".to_string()),
            description: String::new(),
            popularity: 0.5,
            pinned: false,
            fact_sources: Default::default(),
        };
        poi.tag_all_facts(source);
        poi
    }

    fn itinerary_with(pois: Vec<Poi>) -> Itinerary {
        let mut day = ItineraryDay::new(1, None);
        let mut arena = PoiArena::new();
        for poi in pois {
            day.items.push(ScheduleItem {
                poi_id: poi.id.clone(),
                time_slot: TimeSlot::Morning,
                start_time: None,
                end_time: None,
                travel_minutes: 0.0,
                buffer_minutes: 0.0,
                notes: String::new(),
                is_backup: false,
                cluster: String::new(),
            });
            arena.insert(poi);
        }
        Itinerary {
            city: "Test".to_string(),
            days: vec![day],
            pois: arena,
            routing_confidence: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_confidence_formula() {
        // All verified, no fallback, perfect routing
        assert!((confidence_score(1.0, 0.0, 1.0) - 1.0).abs() < 1e-9);
        // Nothing verified, all fallback, no routing signal
        assert!(confidence_score(0.0, 1.0, 0.0) < 1e-9);
        // Mixed case
        let score = confidence_score(0.5, 0.1, 0.5);
        assert!((score - (0.3 + 0.27 + 0.05)).abs() < 1e-9);
    }

    #[test]
    fn test_degrade_ladder() {
        assert_eq!(degrade_level(0.9, RunMode::Realtime), DegradeLevel::L0);
        // High confidence without realtime providers cannot reach L0
        assert_eq!(degrade_level(0.9, RunMode::Degraded), DegradeLevel::L1);
        assert_eq!(degrade_level(0.72, RunMode::Degraded), DegradeLevel::L1);
        assert_eq!(degrade_level(0.6, RunMode::Degraded), DegradeLevel::L2);
        assert_eq!(degrade_level(0.3, RunMode::Degraded), DegradeLevel::L3);
    }

    #[test]
    fn test_tally_counts_only_scheduled() {
        let mut itinerary = itinerary_with(vec![
            poi_with_sources("a", SourceType::Verified),
            poi_with_sources("b", SourceType::Fallback),
        ]);
        // Backup POIs do not count toward the tally
        itinerary.pois.insert(poi_with_sources("backup", SourceType::Unknown));
        itinerary.days[0]
            .backups
            .push(ScheduleItem::backup("backup", "spare"));

        let (total, trusted, fallback) = tally_facts(&itinerary);
        assert_eq!(total, 8);
        assert_eq!(trusted, 4);
        assert_eq!(fallback, 4);
    }

    #[test]
    fn test_assess_mixed_itinerary() {
        let itinerary = itinerary_with(vec![
            poi_with_sources("a", SourceType::Verified),
            poi_with_sources("b", SourceType::Curated),
            poi_with_sources("c", SourceType::Heuristic),
            poi_with_sources("d", SourceType::Heuristic),
        ]);

        let summary = assess(&itinerary, RunMode::Degraded);
        assert_eq!(summary.verified_fact_ratio, 0.5);
        assert_eq!(summary.fallback_rate, 0.0);
        // 0.6*0.5 + 0.3*1.0 + 0.1*0.5 = 0.65 -> L2
        assert!((summary.confidence_score - 0.65).abs() < 1e-9);
        assert_eq!(summary.degrade_level, DegradeLevel::L2);
    }

    #[test]
    fn test_fingerprint_assembly() {
        let fp = build_fingerprint("curated", "fixture", "template", false, ".env", "trace-1");
        assert_eq!(fp.run_mode, RunMode::Degraded);
        assert_eq!(fp.trace_id, "trace-1");

        let fp = build_fingerprint("mapreal", "real", "openai", true, ".env", "trace-2");
        assert_eq!(fp.run_mode, RunMode::Realtime);
        assert!(fp.strict_external_data);
    }
}
