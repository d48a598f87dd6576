//! External data provider interfaces
//!
//! Typed capability traits replace runtime dispatch: `PoiSearch` for
//! candidate discovery, `RouteBetween` for travel legs. A factory selects
//! concrete providers from configuration; nothing is patched at runtime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod curated;
mod fixture;
mod map;
mod route_planner;

pub use curated::CuratedPoiProvider;
pub use fixture::FixtureRouteProvider;
pub use map::{MapPoiProvider, RealRouteProvider};
pub use route_planner::{RouteLeg, RoutePlanner};

use crate::config::{Config, RoutingMode};
use crate::dataset::PoiDataset;
use crate::domain::{Poi, TransportMode};
use crate::retry::Transient;

/// Concrete provider variant, reported in the run fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Curated,
    MapReal,
    Llm,
    Fixture,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Curated => write!(f, "curated"),
            Self::MapReal => write!(f, "mapreal"),
            Self::Llm => write!(f, "llm"),
            Self::Fixture => write!(f, "fixture"),
        }
    }
}

/// Errors from external providers
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed provider response: {0}")]
    Decode(String),
}

impl Transient for ProviderError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error()),
            Self::Unavailable(_) | Self::Decode(_) => false,
        }
    }
}

/// POI discovery query
#[derive(Debug, Clone)]
pub struct PoiQuery {
    pub city: String,
    pub themes: Vec<String>,
    pub max_results: usize,
}

/// One travel leg request
#[derive(Debug, Clone)]
pub struct RouteQuery {
    pub from_id: String,
    pub from: (f64, f64),
    pub to_id: String,
    pub to: (f64, f64),
    pub mode: TransportMode,
}

/// POI discovery capability
#[async_trait]
pub trait PoiSearch: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn search_poi(&self, query: &PoiQuery) -> Result<Vec<Poi>, ProviderError>;
}

/// Point-to-point routing capability
#[async_trait]
pub trait RouteBetween: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn route_between(&self, query: &RouteQuery) -> Result<RouteLeg, ProviderError>;
}

/// The providers a request plans against
pub struct ProviderSet {
    pub curated: Arc<CuratedPoiProvider>,
    pub map_poi: Option<Arc<MapPoiProvider>>,
    pub routes: Arc<RoutePlanner>,
}

impl ProviderSet {
    /// Provider name for the fingerprint's poi_provider field
    pub fn poi_provider_name(&self) -> &'static str {
        if self.map_poi.is_some() {
            "mapreal"
        } else {
            "curated"
        }
    }

    pub fn route_provider_name(&self) -> &'static str {
        self.routes.provider_name()
    }
}

/// Select concrete providers from configuration
pub fn build_providers(config: &Config, dataset: Arc<PoiDataset>) -> ProviderSet {
    let map_key = config.providers.map_api_key();
    let map_timeout = Duration::from_millis(config.providers.map_timeout_ms);

    let map_poi = map_key.as_ref().map(|key| {
        Arc::new(MapPoiProvider::new(
            config.providers.map_base_url.clone(),
            key.clone(),
            map_timeout,
        ))
    });

    let real_route: Option<Arc<dyn RouteBetween>> = match (config.providers.routing, &map_key) {
        (RoutingMode::Fixture, _) => None,
        (RoutingMode::Real | RoutingMode::Auto, Some(key)) => Some(Arc::new(RealRouteProvider::new(
            config.providers.map_base_url.clone(),
            key.clone(),
            map_timeout,
        ))),
        (RoutingMode::Real, None) => {
            // Misconfigured; surfaced as fixture so strict mode can reject it
            tracing::warn!("routing=real but no map API key configured, using fixture");
            None
        }
        (RoutingMode::Auto, None) => None,
    };

    ProviderSet {
        curated: Arc::new(CuratedPoiProvider::new(dataset)),
        map_poi,
        routes: Arc::new(RoutePlanner::new(
            real_route,
            map_timeout,
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_names() {
        assert_eq!(ProviderKind::Curated.to_string(), "curated");
        assert_eq!(ProviderKind::MapReal.to_string(), "mapreal");
        assert_eq!(ProviderKind::Fixture.to_string(), "fixture");
    }

    #[test]
    fn test_provider_error_transience() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(!ProviderError::Unavailable("map".to_string()).is_transient());
        assert!(!ProviderError::Decode("bad json".to_string()).is_transient());
    }

    #[test]
    fn test_build_providers_without_key_is_curated_fixture() {
        let config = Config::default();
        let dataset = Arc::new(PoiDataset::embedded().unwrap());
        let providers = build_providers(&config, dataset);

        assert!(providers.map_poi.is_none());
        assert_eq!(providers.poi_provider_name(), "curated");
        assert_eq!(providers.route_provider_name(), "fixture");
    }
}
