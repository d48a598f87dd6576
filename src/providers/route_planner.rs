//! Route planning facade: cache, real-provider override, fixture fallback

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::fixture::FixtureRouteProvider;
use super::{RouteBetween, RouteQuery};
use crate::retry::{call_with_retry, CallError, Deadline};

/// One computed travel leg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub minutes: f64,
    pub distance_km: f64,

    /// 1.0 for real routes, 0.5 for fixture estimates
    pub confidence: f64,
}

/// The scheduler's single entry point for travel legs.
///
/// Consults the route cache, then the real provider (with retry and the
/// per-call timeout), then degrades to the fixture estimate. Fixture results
/// carry a 0.5 confidence which the trust layer folds into the final score.
pub struct RoutePlanner {
    real: Option<Arc<dyn RouteBetween>>,
    fixture: FixtureRouteProvider,
    cache: crate::cache::TtlLruCache<String, RouteLeg>,
    call_timeout: Duration,
}

impl RoutePlanner {
    pub fn new(
        real: Option<Arc<dyn RouteBetween>>,
        call_timeout: Duration,
        cache_capacity: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            real,
            fixture: FixtureRouteProvider,
            cache: crate::cache::TtlLruCache::new(cache_capacity, cache_ttl),
            call_timeout,
        }
    }

    /// "real" when a live provider is configured, "fixture" otherwise
    pub fn provider_name(&self) -> &'static str {
        if self.real.is_some() {
            "real"
        } else {
            "fixture"
        }
    }

    /// Compute one leg. Never fails: the fixture estimate is total.
    pub async fn leg(&self, query: &RouteQuery, deadline: Deadline) -> RouteLeg {
        let cache_key = format!("{}|{}|{}", query.from_id, query.to_id, query.mode);
        if let Some(cached) = self.cache.get(&cache_key) {
            return cached;
        }

        let leg = match &self.real {
            Some(provider) => {
                let result = call_with_retry("route_between", self.call_timeout, deadline, || {
                    provider.route_between(query)
                })
                .await;

                match result {
                    Ok(leg) => leg,
                    Err(CallError::DeadlineExceeded) => {
                        debug!("route call out of deadline budget, using fixture");
                        self.fixture_leg(query).await
                    }
                    Err(e) => {
                        warn!(error = %e, "real route provider failed, using fixture");
                        self.fixture_leg(query).await
                    }
                }
            }
            None => self.fixture_leg(query).await,
        };

        self.cache.put(cache_key, leg);
        leg
    }

    async fn fixture_leg(&self, query: &RouteQuery) -> RouteLeg {
        self.fixture
            .route_between(query)
            .await
            .unwrap_or(RouteLeg {
                minutes: 0.0,
                distance_km: 0.0,
                confidence: 0.5,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportMode;

    fn query() -> RouteQuery {
        RouteQuery {
            from_id: "a".to_string(),
            from: (39.9163, 116.3972),
            to_id: "b".to_string(),
            to: (39.8822, 116.4066),
            mode: TransportMode::PublicTransit,
        }
    }

    #[tokio::test]
    async fn test_fixture_only_planner() {
        let planner = RoutePlanner::new(None, Duration::from_secs(5), 100, Duration::from_secs(60));
        assert_eq!(planner.provider_name(), "fixture");

        let deadline = Deadline::after(Duration::from_secs(5));
        let leg = planner.leg(&query(), deadline).await;
        assert!(leg.minutes > 0.0);
        assert_eq!(leg.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_leg_is_cached() {
        let planner = RoutePlanner::new(None, Duration::from_secs(5), 100, Duration::from_secs(60));
        let deadline = Deadline::after(Duration::from_secs(5));

        let first = planner.leg(&query(), deadline).await;
        let second = planner.leg(&query(), deadline).await;
        assert_eq!(first, second);
        assert!(planner.cache.stats().hits >= 1);
    }
}
