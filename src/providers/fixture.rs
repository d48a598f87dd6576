//! Deterministic fixture routing

use async_trait::async_trait;

use super::{ProviderError, ProviderKind, RouteBetween, RouteLeg, RouteQuery};
use crate::scheduler::distance::{estimate_travel_minutes, haversine_km, DETOUR_FACTOR};

/// Fixture routing confidence; real routes report 1.0
pub const FIXTURE_ROUTING_CONFIDENCE: f64 = 0.5;

/// Estimates legs from haversine distance and mode speed. Used whenever no
/// real route provider is configured, and as the degradation target when the
/// real one fails.
pub struct FixtureRouteProvider;

#[async_trait]
impl RouteBetween for FixtureRouteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Fixture
    }

    async fn route_between(&self, query: &RouteQuery) -> Result<RouteLeg, ProviderError> {
        let crow_km = haversine_km(query.from.0, query.from.1, query.to.0, query.to.1);
        let road_km = crow_km * DETOUR_FACTOR;
        Ok(RouteLeg {
            minutes: estimate_travel_minutes(road_km, query.mode),
            distance_km: road_km,
            confidence: FIXTURE_ROUTING_CONFIDENCE,
        })
    }
}
