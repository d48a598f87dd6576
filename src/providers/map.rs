//! Real map provider (POI search, enrichment, routing)
//!
//! Speaks a JSON place/direction API. Every fact the map reports is tagged
//! `verified`; anything the enrichment pass could not fill stays untagged and
//! the trust layer scores it accordingly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{PoiQuery, PoiSearch, ProviderError, ProviderKind, RouteBetween, RouteLeg, RouteQuery};
use crate::domain::{normalize_name, Poi, SourceType};

/// Map-backed POI discovery
pub struct MapPoiProvider {
    base_url: String,
    api_key: String,
    http: Client,
}

impl MapPoiProvider {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http: Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client"),
        }
    }

    fn poi_from_entry(&self, entry: PlaceEntry, city: &str) -> Option<Poi> {
        let (lon, lat) = entry.location.split_once(',')?;
        let lat: f64 = lat.trim().parse().ok()?;
        let lon: f64 = lon.trim().parse().ok()?;

        let mut poi = Poi {
            id: format!("map-{}", normalize_name(&entry.name)),
            name: entry.name,
            city: city.to_string(),
            lat,
            lon,
            themes: entry.tags,
            duration_hours: entry.suggested_duration_hours.unwrap_or(1.5),
            cost: entry.ticket_price.unwrap_or(0.0),
            indoor: entry.indoor.unwrap_or(false),
            ticket_price: entry.ticket_price.unwrap_or(0.0),
            reservation_required: entry.reservation_required.unwrap_or(false),
            closed_weekdays: Vec::new(),
            closed_rules: String::new(),
            open_hours: entry.open_hours,
            description: entry.address.unwrap_or_default(),
            popularity: entry.rating.map(|r| (r / 5.0).clamp(0.0, 1.0)).unwrap_or(0.5),
            pinned: false,
            fact_sources: Default::default(),
        };

        if entry.ticket_price.is_some() {
            poi.tag_fact("ticket_price", SourceType::Verified);
        }
        if entry.reservation_required.is_some() {
            poi.tag_fact("reservation_required", SourceType::Verified);
        }
        if poi.open_hours.is_some() {
            poi.tag_fact("open_hours", SourceType::Verified);
        }
        Some(poi)
    }
}

#[async_trait]
impl PoiSearch for MapPoiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MapReal
    }

    async fn search_poi(&self, query: &PoiQuery) -> Result<Vec<Poi>, ProviderError> {
        let url = format!("{}/place/text", self.base_url);
        let keywords = query.themes.join("|");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("city", query.city.as_str()),
                ("keywords", keywords.as_str()),
                ("offset", "25"),
            ])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "map place search returned {}",
                response.status()
            )));
        }

        let body: PlaceResponse = response.json().await.map_err(map_reqwest_error)?;
        if body.status != "1" {
            return Err(ProviderError::Decode(format!("map status {}", body.status)));
        }

        let pois: Vec<Poi> = body
            .pois
            .into_iter()
            .filter_map(|entry| self.poi_from_entry(entry, &query.city))
            .take(query.max_results)
            .collect();
        debug!(city = %query.city, found = pois.len(), "map search");
        Ok(pois)
    }
}

/// Map-backed point-to-point routing, confidence 1.0
pub struct RealRouteProvider {
    base_url: String,
    api_key: String,
    http: Client,
}

impl RealRouteProvider {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http: Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client"),
        }
    }
}

#[async_trait]
impl RouteBetween for RealRouteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MapReal
    }

    async fn route_between(&self, query: &RouteQuery) -> Result<RouteLeg, ProviderError> {
        let url = format!("{}/direction", self.base_url);
        let origin = format!("{},{}", query.from.1, query.from.0);
        let destination = format!("{},{}", query.to.1, query.to.0);
        let mode = query.mode.to_string();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("mode", mode.as_str()),
            ])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "map direction returned {}",
                response.status()
            )));
        }

        let body: DirectionResponse = response.json().await.map_err(map_reqwest_error)?;
        let route = body
            .route
            .ok_or_else(|| ProviderError::Decode("direction response missing route".to_string()))?;

        Ok(RouteLeg {
            minutes: route.duration_seconds / 60.0,
            distance_km: route.distance_meters / 1000.0,
            confidence: 1.0,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Http(e)
    }
}

#[derive(Debug, Deserialize)]
struct PlaceResponse {
    status: String,
    #[serde(default)]
    pois: Vec<PlaceEntry>,
}

#[derive(Debug, Deserialize)]
struct PlaceEntry {
    name: String,
    /// "lon,lat"
    location: String,
    #[serde(default)]
    tags: Vec<String>,
    address: Option<String>,
    rating: Option<f64>,
    open_hours: Option<String>,
    ticket_price: Option<f64>,
    reservation_required: Option<bool>,
    suggested_duration_hours: Option<f64>,
    indoor: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DirectionResponse {
    route: Option<DirectionRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionRoute {
    duration_seconds: f64,
    distance_meters: f64,
}
