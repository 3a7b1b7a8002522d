//! Search/metadata capability.
//!
//! Text search, ranking and result formatting belong to the host. The core
//! only consumes the [`Track`] values a search produces, so the contract is
//! two calls wide.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{SourceKind, Track};

/// Host-provided catalog search.
///
/// # Example
///
/// ```ignore
/// let results = search.search("massive attack teardrop", SourceKind::AudioHost).await?;
/// player.play_track(results[0].clone(), Some(results), Some(0)).await;
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Free-text search against a single source.
    async fn search(&self, query: &str, source: SourceKind) -> Result<Vec<Track>>;

    /// Tracks of a catalog-aggregator album or playlist, in album order.
    async fn collection_tracks(&self, collection_id: &str) -> Result<Vec<Track>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibraryError;

    #[tokio::test]
    async fn test_mock_search_returns_tracks() {
        let mut search = MockCatalogSearch::new();
        search
            .expect_search()
            .withf(|query, source| query == "teardrop" && *source == SourceKind::AudioHost)
            .returning(|_, source| Ok(vec![Track::new("1", "Teardrop", source)]));
        search
            .expect_collection_tracks()
            .returning(|id| Err(LibraryError::Search(format!("unknown album {id}"))));

        let results = search.search("teardrop", SourceKind::AudioHost).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, SourceKind::AudioHost);

        assert!(search.collection_tracks("album-1").await.is_err());
    }
}
