//! Retriever: ranked POI candidate pool
//!
//! Source ladder: curated dataset, map provider, LLM generation as the last
//! resort when the pool is still thin. The external calls fan out
//! concurrently and join before scheduling starts. Results are fused with
//! provenance ranking, filtered against the avoid list, pinned for
//! must-visits, and scored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

mod fusion;

pub use fusion::merge_candidates;

use crate::cache::TtlLruCache;
use crate::domain::{normalize_name, Poi, TripConstraints, UserProfile};
use crate::error::PlanError;
use crate::llm::{extract_json_block, CompletionRequest, LlmClient, Message};
use crate::prompts::PromptLoader;
use crate::providers::{PoiQuery, PoiSearch, ProviderSet};
use crate::retry::{call_with_retry, Deadline};

/// Ranked candidates for the scheduler, best first
#[derive(Debug, Clone)]
pub struct CandidatePool {
    pub pois: Vec<Poi>,

    /// Ranking score per POI id
    pub scores: HashMap<String, f64>,

    /// Must-visit names that no source could resolve
    pub unmatched_must_visit: Vec<String>,
}

impl CandidatePool {
    pub fn score_of(&self, poi_id: &str) -> f64 {
        self.scores.get(poi_id).copied().unwrap_or(0.0)
    }
}

pub struct Retriever {
    providers: Arc<ProviderSet>,
    llm: Option<Arc<dyn LlmClient>>,
    prompts: Arc<PromptLoader>,
    poi_cache: TtlLruCache<String, Vec<Poi>>,
    strict_external_data: bool,
    map_timeout: Duration,
    llm_timeout: Duration,
}

impl Retriever {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        providers: Arc<ProviderSet>,
        llm: Option<Arc<dyn LlmClient>>,
        prompts: Arc<PromptLoader>,
        cache_capacity: usize,
        cache_ttl: Duration,
        strict_external_data: bool,
        map_timeout: Duration,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            providers,
            llm,
            prompts,
            poi_cache: TtlLruCache::new(cache_capacity, cache_ttl),
            strict_external_data,
            map_timeout,
            llm_timeout,
        }
    }

    /// Assemble the candidate pool for one request
    pub async fn run(
        &self,
        constraints: &TripConstraints,
        profile: &UserProfile,
        deadline: Deadline,
    ) -> Result<CandidatePool, PlanError> {
        let pool_target = pool_size(constraints);
        let min_pool = (2 * constraints.days) as usize;
        debug!(city = %constraints.city, pool_target, min_pool, "retrieve: run");

        // Strict mode forbids silently degrading past a missing map provider
        if self.strict_external_data && self.providers.map_poi.is_none() {
            return Err(PlanError::ProviderUnavailable {
                provider: "map".to_string(),
            });
        }

        let mut candidates = self.gather(constraints, profile, deadline).await?;

        // LLM generation only when the external sources came up short
        if candidates.len() < min_pool {
            if let Some(generated) = self.llm_generate(constraints, profile, pool_target, deadline).await {
                info!(generated = generated.len(), "retrieve: LLM fallback generation");
                candidates = merge_candidates(vec![candidates, generated]);
            }
        }

        Ok(self.assemble_pool(candidates, constraints, profile, pool_target))
    }

    /// Curated + map lookups, fanned out and joined
    async fn gather(
        &self,
        constraints: &TripConstraints,
        profile: &UserProfile,
        deadline: Deadline,
    ) -> Result<Vec<Poi>, PlanError> {
        let cache_key = format!(
            "{}|{}",
            normalize_name(&constraints.city),
            profile.themes.join(",").to_lowercase()
        );
        if let Some(cached) = self.poi_cache.get(&cache_key) {
            debug!("retrieve: candidate cache hit");
            return Ok(cached);
        }

        let query = PoiQuery {
            city: constraints.city.clone(),
            themes: profile.themes.clone(),
            max_results: 50,
        };

        let curated_call = self.providers.curated.search_poi(&query);
        let map_call = async {
            match &self.providers.map_poi {
                Some(map) => {
                    let result = call_with_retry("map_poi_search", self.map_timeout, deadline, || {
                        map.search_poi(&query)
                    })
                    .await;
                    match result {
                        Ok(pois) => Some(pois),
                        Err(e) => {
                            warn!(error = %e, "retrieve: map provider failed");
                            None
                        }
                    }
                }
                None => None,
            }
        };

        let (curated_result, map_result) = tokio::join!(curated_call, map_call);

        let curated = curated_result.unwrap_or_default();
        let map_pois = match map_result {
            Some(pois) => pois,
            None if self.strict_external_data && self.providers.map_poi.is_some() => {
                // The provider exists but would not answer; strict mode fails fast
                return Err(PlanError::ProviderUnavailable {
                    provider: "map".to_string(),
                });
            }
            None => Vec::new(),
        };

        let merged = merge_candidates(vec![curated, map_pois]);
        self.poi_cache.put(cache_key, merged.clone());
        Ok(merged)
    }

    async fn llm_generate(
        &self,
        constraints: &TripConstraints,
        profile: &UserProfile,
        count: usize,
        deadline: Deadline,
    ) -> Option<Vec<Poi>> {
        let llm = self.llm.as_ref()?;

        let prompt = self
            .prompts
            .render(
                "poi-generate",
                &serde_json::json!({
                    "city": constraints.city,
                    "count": count,
                    "themes": profile.themes.join(", "),
                }),
            )
            .ok()?;

        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![Message::user(prompt)],
            max_tokens: 2048,
        };

        let response = call_with_retry("poi_generate", self.llm_timeout, deadline, || {
            llm.complete(request.clone())
        })
        .await;

        let content = match response {
            Ok(completion) => completion.content,
            Err(e) => {
                warn!(error = %e, "retrieve: LLM generation failed");
                return None;
            }
        };

        let entries: Vec<GeneratedPoi> = match serde_json::from_str(extract_json_block(&content)) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "retrieve: LLM generation not parseable");
                return None;
            }
        };

        let pois = entries
            .into_iter()
            .filter(|e| !e.name.trim().is_empty() && e.duration_hours > 0.0)
            .map(|e| fusion::tag_heuristic(e.into_poi(&constraints.city)))
            .collect();
        Some(pois)
    }

    /// Filter, pin, score, and truncate the merged candidates
    fn assemble_pool(
        &self,
        candidates: Vec<Poi>,
        constraints: &TripConstraints,
        profile: &UserProfile,
        pool_target: usize,
    ) -> CandidatePool {
        let avoid: Vec<String> = constraints.avoid.iter().map(|n| normalize_name(n)).collect();
        let mut pois: Vec<Poi> = candidates
            .into_iter()
            .filter(|poi| {
                let key = normalize_name(&poi.name);
                !avoid.iter().any(|banned| key.contains(banned.as_str()))
            })
            .collect();

        // Pin must-visits by fuzzy name containment
        let mut unmatched = Vec::new();
        for wanted in &constraints.must_visit {
            let wanted_key = normalize_name(wanted);
            let mut found = false;
            for poi in pois.iter_mut() {
                let key = normalize_name(&poi.name);
                if key.contains(wanted_key.as_str()) || wanted_key.contains(key.as_str()) {
                    poi.pinned = true;
                    found = true;
                }
            }
            if !found {
                unmatched.push(wanted.clone());
            }
        }

        let mut scores: HashMap<String, f64> = HashMap::new();
        for poi in &pois {
            scores.insert(poi.id.clone(), rank_score(poi, constraints, profile));
        }

        // Best first; exact ties break lexicographically by name
        pois.sort_by(|a, b| {
            let score_a = scores.get(&a.id).copied().unwrap_or(0.0);
            let score_b = scores.get(&b.id).copied().unwrap_or(0.0);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        // Truncate to target size without ever dropping a pinned POI
        if pois.len() > pool_target {
            let (pinned, mut rest): (Vec<Poi>, Vec<Poi>) = pois.into_iter().partition(|p| p.pinned);
            rest.truncate(pool_target.saturating_sub(pinned.len()));
            pois = pinned;
            pois.extend(rest);
            pois.sort_by(|a, b| {
                let score_a = scores.get(&a.id).copied().unwrap_or(0.0);
                let score_b = scores.get(&b.id).copied().unwrap_or(0.0);
                score_b
                    .partial_cmp(&score_a)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.name.cmp(&b.name))
            });
        }

        info!(pool = pois.len(), unmatched = unmatched.len(), "retrieve: pool assembled");
        CandidatePool {
            pois,
            scores,
            unmatched_must_visit: unmatched,
        }
    }
}

/// `ceil(days * pace_multiplier * 1.5)`
pub fn pool_size(constraints: &TripConstraints) -> usize {
    let raw = constraints.days as f64 * f64::from(constraints.pace.pool_multiplier()) * 1.5;
    raw.ceil() as usize
}

/// Ranking: `theme_match*3 + indoor_bonus + popularity - cost/daily_budget*0.5`
fn rank_score(poi: &Poi, constraints: &TripConstraints, profile: &UserProfile) -> f64 {
    let theme_match = poi.theme_overlap(&profile.themes) as f64;
    let indoor_bonus = if poi.indoor { 1.0 } else { 0.0 };

    let cost_penalty = match constraints.daily_budget {
        Some(budget) if budget > 0.0 => poi.effective_ticket() / budget * 0.5,
        _ => 0.0,
    };

    theme_match * 3.0 + indoor_bonus + poi.popularity - cost_penalty
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GeneratedPoi {
    id: String,
    name: String,
    lat: f64,
    lon: f64,
    themes: Vec<String>,
    duration_hours: f64,
    ticket_price: f64,
    indoor: bool,
    open_hours: Option<String>,
    description: String,
}

impl Default for GeneratedPoi {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            lat: 0.0,
            lon: 0.0,
            themes: Vec::new(),
            duration_hours: 1.5,
            ticket_price: 0.0,
            indoor: false,
            open_hours: None,
            description: String::new(),
        }
    }
}

impl GeneratedPoi {
    fn into_poi(self, city: &str) -> Poi {
        let id = if self.id.is_empty() {
            format!("llm-{}", normalize_name(&self.name))
        } else {
            format!("llm-{}", normalize_name(&self.id))
        };
        Poi {
            id,
            name: self.name,
            city: city.to_string(),
            lat: self.lat,
            lon: self.lon,
            themes: self.themes,
            duration_hours: self.duration_hours,
            cost: self.ticket_price,
            indoor: self.indoor,
            ticket_price: self.ticket_price,
            reservation_required: false,
            closed_weekdays: Vec::new(),
            closed_rules: String::new(),
            open_hours: self.open_hours,
            description: self.description,
            popularity: 0.4,
            pinned: false,
            fact_sources: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dataset::PoiDataset;
    use crate::domain::Pace;
    use crate::providers::build_providers;

    fn retriever(strict: bool) -> Retriever {
        let config = Config::default();
        let dataset = Arc::new(PoiDataset::embedded().unwrap());
        let providers = Arc::new(build_providers(&config, dataset));
        Retriever::new(
            providers,
            None,
            Arc::new(PromptLoader::default()),
            100,
            Duration::from_secs(60),
            strict,
            Duration::from_secs(5),
            Duration::from_secs(30),
        )
    }

    fn far_deadline() -> Deadline {
        Deadline::after(Duration::from_secs(60))
    }

    #[test]
    fn test_pool_size_formula() {
        let mut constraints = TripConstraints::new("Beijing", 4);
        constraints.pace = Pace::Moderate;
        assert_eq!(pool_size(&constraints), 18); // ceil(4 * 3 * 1.5)

        constraints.pace = Pace::Relaxed;
        assert_eq!(pool_size(&constraints), 12);

        constraints.days = 1;
        constraints.pace = Pace::Intensive;
        assert_eq!(pool_size(&constraints), 6);
    }

    #[tokio::test]
    async fn test_curated_pool_for_known_city() {
        let constraints = TripConstraints::new("Beijing", 3);
        let profile = UserProfile {
            themes: vec!["history".to_string()],
            ..Default::default()
        };

        let pool = retriever(false).run(&constraints, &profile, far_deadline()).await.unwrap();
        assert!(pool.pois.len() >= 6);
        // History POIs rank above non-matching ones
        assert!(pool.pois[0].themes.iter().any(|t| t == "history"));
    }

    #[tokio::test]
    async fn test_strict_mode_fails_fast_without_map() {
        let constraints = TripConstraints::new("Beijing", 3);
        let profile = UserProfile::default();

        let result = retriever(true).run(&constraints, &profile, far_deadline()).await;
        assert!(matches!(result, Err(PlanError::ProviderUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_avoid_list_removes_poi() {
        let mut constraints = TripConstraints::new("Beijing", 3);
        constraints.avoid.push("Forbidden City".to_string());
        let profile = UserProfile::default();

        let pool = retriever(false).run(&constraints, &profile, far_deadline()).await.unwrap();
        assert!(!pool.pois.iter().any(|p| p.name == "Forbidden City"));
    }

    #[tokio::test]
    async fn test_must_visit_is_pinned() {
        let mut constraints = TripConstraints::new("Chengdu", 3);
        constraints.must_visit.push("Panda Base".to_string());
        let profile = UserProfile::default();

        let pool = retriever(false).run(&constraints, &profile, far_deadline()).await.unwrap();
        let panda = pool.pois.iter().find(|p| p.name == "Giant Panda Base").unwrap();
        assert!(panda.pinned);
        assert!(pool.unmatched_must_visit.is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_must_visit_reported() {
        let mut constraints = TripConstraints::new("Beijing", 2);
        constraints.must_visit.push("Area 51".to_string());
        let profile = UserProfile::default();

        let pool = retriever(false).run(&constraints, &profile, far_deadline()).await.unwrap();
        assert_eq!(pool.unmatched_must_visit, vec!["Area 51".to_string()]);
    }

    #[tokio::test]
    async fn test_cost_penalty_lowers_rank() {
        // Tight budget: the 199-ticket tower should not lead the pool
        let mut constraints = TripConstraints::new("Shanghai", 2);
        constraints.daily_budget = Some(100.0);
        let profile = UserProfile::default();

        let pool = retriever(false).run(&constraints, &profile, far_deadline()).await.unwrap();
        assert_ne!(pool.pois[0].name, "Oriental Pearl Tower");
    }
}
