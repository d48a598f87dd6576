//! Deterministic distance and travel-time estimation

use crate::domain::{Poi, TransportMode};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Street networks are not great circles
pub const DETOUR_FACTOR: f64 = 1.4;

/// Great-circle distance between two coordinates, in km
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Road distance estimate between two POIs, in km
pub fn poi_distance_km(a: &Poi, b: &Poi) -> f64 {
    haversine_km(a.lat, a.lon, b.lat, b.lon) * DETOUR_FACTOR
}

/// Straight-line clustering distance between two POIs, in km
pub fn poi_crow_km(a: &Poi, b: &Poi) -> f64 {
    haversine_km(a.lat, a.lon, b.lat, b.lon)
}

/// Estimated travel time for a road distance, in minutes
pub fn estimate_travel_minutes(distance_km: f64, mode: TransportMode) -> f64 {
    distance_km / mode.speed_kmh() * 60.0
}
