//! Curated dataset POI provider

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{PoiQuery, PoiSearch, ProviderError, ProviderKind};
use crate::dataset::PoiDataset;
use crate::domain::Poi;

/// Serves POIs from the local curated dataset. Always available, never
/// blocks; listed first in the retriever's source ladder.
pub struct CuratedPoiProvider {
    dataset: Arc<PoiDataset>,
}

impl CuratedPoiProvider {
    pub fn new(dataset: Arc<PoiDataset>) -> Self {
        Self { dataset }
    }
}

#[async_trait]
impl PoiSearch for CuratedPoiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Curated
    }

    async fn search_poi(&self, query: &PoiQuery) -> Result<Vec<Poi>, ProviderError> {
        let mut pois: Vec<Poi> = self.dataset.lookup(&query.city).to_vec();
        debug!(city = %query.city, found = pois.len(), "curated search");

        // Theme-matching POIs first, but keep the rest: the ranking stage
        // weighs themes properly and small cities need the full pool.
        if !query.themes.is_empty() {
            pois.sort_by_key(|p| std::cmp::Reverse(p.theme_overlap(&query.themes)));
        }

        pois.truncate(query.max_results);
        Ok(pois)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> CuratedPoiProvider {
        CuratedPoiProvider::new(Arc::new(PoiDataset::embedded().unwrap()))
    }

    #[tokio::test]
    async fn test_search_known_city() {
        let query = PoiQuery {
            city: "Beijing".to_string(),
            themes: vec![],
            max_results: 50,
        };
        let pois = provider().search_poi(&query).await.unwrap();
        assert!(pois.len() >= 8);
    }

    #[tokio::test]
    async fn test_theme_matches_sort_first() {
        let query = PoiQuery {
            city: "Beijing".to_string(),
            themes: vec!["food".to_string()],
            max_results: 50,
        };
        let pois = provider().search_poi(&query).await.unwrap();
        assert!(pois[0].themes.iter().any(|t| t == "food"));
    }

    #[tokio::test]
    async fn test_unknown_city_empty() {
        let query = PoiQuery {
            city: "Atlantis".to_string(),
            themes: vec![],
            max_results: 10,
        };
        let pois = provider().search_poi(&query).await.unwrap();
        assert!(pois.is_empty());
    }

    #[tokio::test]
    async fn test_max_results_respected() {
        let query = PoiQuery {
            city: "Beijing".to_string(),
            themes: vec![],
            max_results: 3,
        };
        let pois = provider().search_poi(&query).await.unwrap();
        assert_eq!(pois.len(), 3);
    }
}
