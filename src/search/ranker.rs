//! Hybrid hotel ranking.
//!
//! Structured filters narrow the corpus first. With a keyword, every
//! surviving hotel is scored by cosine similarity between the keyword's
//! embedding and the embedding of its description and amenities. The result
//! is the union of the semantic set (`score >= threshold`) and the literal set
//! (keyword is a case-insensitive substring of the description or of an
//! amenity), sorted by score descending. Literal-only hotels score 0.
//!
//! Embedding failures never fail the search: the ranker logs them and falls
//! back to the structured-filter result, flagging it as degraded.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cache::EmbeddingCache;
use super::embeddings::{EmbeddingError, EmbeddingProvider};
use super::filters::SearchFilters;
use super::preprocess::hotel_text;
use super::similarity::{cosine_similarity, SimilarityError};
use super::DEFAULT_THRESHOLD;
use crate::hotels::Hotel;

/// A hotel as seen by the ranker: the record plus its room prices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HotelSnapshot {
    pub hotel: Hotel,
    pub room_prices: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedHotel {
    pub id: u64,
    /// Similarity to the keyword; 0 for literal-only matches and keyword-less searches.
    pub score: f32,
}

/// Why keyword ranking was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    ModelUnavailable,
    DimensionMismatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub hotels: Vec<RankedHotel>,
    /// Set when the keyword was dropped and only structured filters applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<Degradation>,
}

impl RankedResult {
    pub fn ids(&self) -> Vec<u64> {
        self.hotels.iter().map(|h| h.id).collect()
    }

    pub fn len(&self) -> usize {
        self.hotels.len()
    }
}

#[derive(Debug, thiserror::Error)]
enum RankError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}

pub struct HybridRanker {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<EmbeddingCache>>,
    threshold: f32,
}

impl HybridRanker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Reuse hotel embeddings across searches.
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn cache(&self) -> Option<&EmbeddingCache> {
        self.cache.as_deref()
    }

    /// Rank `corpus` against `filters`.
    pub fn rank(&self, corpus: &[HotelSnapshot], filters: &SearchFilters) -> RankedResult {
        let mut candidates = filters.apply(corpus);

        let mut seen = HashSet::new();
        candidates.retain(|s| seen.insert(s.hotel.id));

        let Some(keyword) = filters.keyword() else {
            return Self::unscored(&candidates, None);
        };

        if candidates.is_empty() {
            return RankedResult::default();
        }

        match self.rank_by_keyword(keyword, &candidates) {
            Ok(hotels) => RankedResult {
                hotels,
                degraded: None,
            },
            Err(RankError::Embedding(err)) => {
                log::warn!("keyword ranking skipped, using structured filters only: {err}");
                Self::unscored(&candidates, Some(Degradation::ModelUnavailable))
            }
            Err(RankError::Similarity(err)) => {
                log::error!(
                    "embedding provider '{}' returned inconsistent vectors: {err}",
                    self.provider.name()
                );
                Self::unscored(&candidates, Some(Degradation::DimensionMismatch))
            }
        }
    }

    fn rank_by_keyword(
        &self,
        keyword: &str,
        candidates: &[&HotelSnapshot],
    ) -> Result<Vec<RankedHotel>, RankError> {
        let keyword_vec = self.provider.embed(keyword)?;
        let needle = keyword.to_lowercase();

        let mut matched = Vec::with_capacity(candidates.len());
        for snapshot in candidates {
            let hotel = &snapshot.hotel;
            let hotel_vec = self.hotel_embedding(hotel)?;
            let score = cosine_similarity(&keyword_vec, &hotel_vec)?;

            if score >= self.threshold {
                matched.push(RankedHotel {
                    id: hotel.id,
                    score,
                });
            } else if is_literal_match(hotel, &needle) {
                matched.push(RankedHotel {
                    id: hotel.id,
                    score: 0.0,
                });
            }
        }

        log::debug!(
            "keyword {keyword:?}: {} of {} candidates matched",
            matched.len(),
            candidates.len()
        );

        // sort_by is stable, ties keep candidate order
        matched.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        Ok(matched)
    }

    fn hotel_embedding(&self, hotel: &Hotel) -> Result<Vec<f32>, EmbeddingError> {
        let text = hotel_text(&hotel.description, &hotel.amenities);
        match &self.cache {
            Some(cache) => cache.get_or_embed(hotel.id, &text, self.provider.as_ref()),
            None => self.provider.embed(&text),
        }
    }

    fn unscored(candidates: &[&HotelSnapshot], degraded: Option<Degradation>) -> RankedResult {
        RankedResult {
            hotels: candidates
                .iter()
                .map(|s| RankedHotel {
                    id: s.hotel.id,
                    score: 0.0,
                })
                .collect(),
            degraded,
        }
    }
}

/// Keyword (already lowercased) appears in the description or in an amenity.
fn is_literal_match(hotel: &Hotel, needle: &str) -> bool {
    hotel.description.to_lowercase().contains(needle)
        || hotel
            .amenities
            .iter()
            .any(|amenity| amenity.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::UnavailableEmbedding;
    use crate::tests::support::{snapshot, StaticEmbedding, VocabEmbedding};

    impl RankedResult {
        fn score_of(&self, id: u64) -> Option<f32> {
            self.hotels.iter().find(|h| h.id == id).map(|h| h.score)
        }

        fn is_empty(&self) -> bool {
            self.hotels.is_empty()
        }
    }

    fn keyword(k: &str) -> SearchFilters {
        SearchFilters {
            keyword: Some(k.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_corpus() {
        let ranker = HybridRanker::new(Arc::new(VocabEmbedding::hotels()));

        assert!(ranker.rank(&[], &SearchFilters::default()).is_empty());
        assert!(ranker.rank(&[], &keyword("spa")).is_empty());

        let filters = SearchFilters {
            location: Some("Goa".to_string()),
            min_rating: Some(3.0),
            max_price: Some(100.0),
            amenities: vec!["pool".to_string()],
            keyword: Some("beach".to_string()),
        };
        let result = ranker.rank(&[], &filters);
        assert!(result.is_empty());
        assert_eq!(result.degraded, None);
    }

    #[test]
    fn test_amenities_compared_case_insensitively() {
        let corpus = vec![
            snapshot(1, "city hotel", &["pool"]),
            snapshot(2, "rooftop bar", &["Gym", "POOL"]),
            snapshot(3, "budget stay", &["wifi"]),
        ];
        let ranker = HybridRanker::new(Arc::new(UnavailableEmbedding::new("test")));
        let filters = SearchFilters {
            amenities: vec!["Pool".to_string(), " gym ".to_string()],
            ..Default::default()
        };

        let result = ranker.rank(&corpus, &filters);

        assert_eq!(result.ids(), vec![2, 1]);
        assert_eq!(result.degraded, None);
    }

    #[test]
    fn test_spa_scenario() {
        let corpus = vec![
            snapshot(1, "luxury spa retreat", &["wifi", "spa"]),
            snapshot(2, "budget stay", &["wifi"]),
        ];
        let ranker = HybridRanker::new(Arc::new(VocabEmbedding::hotels()));

        let result = ranker.rank(&corpus, &keyword("spa"));

        assert_eq!(result.ids(), vec![1]);
        let score = result.score_of(1).unwrap();
        assert!(score >= 0.3, "spa hotel should be a semantic match, got {score}");
    }

    #[test]
    fn test_semantic_match_without_literal() {
        let provider = StaticEmbedding::new(vec![0.0, 0.0])
            .with("relaxation", vec![1.0, 0.0])
            .with("massage and sauna wifi", vec![0.8, 0.6])
            .with("massive gym wifi", vec![0.2, 0.98]);
        let corpus = vec![
            snapshot(1, "massage and sauna", &["wifi"]),
            snapshot(2, "massive gym", &["wifi"]),
        ];
        let ranker = HybridRanker::new(Arc::new(provider));

        let result = ranker.rank(&corpus, &keyword("relaxation"));

        // 1 scores 0.8, 2 scores ~0.2 and has no literal match
        assert_eq!(result.ids(), vec![1]);
        assert!((result.score_of(1).unwrap() - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_literal_match_always_included() {
        // every hotel is orthogonal to the keyword
        let provider = StaticEmbedding::new(vec![0.0, 1.0]).with("pool", vec![1.0, 0.0]);
        let corpus = vec![
            snapshot(1, "Rooftop POOL with a view", &[]),
            snapshot(2, "quiet rooms", &["Poolside bar"]),
            snapshot(3, "quiet rooms", &["gym"]),
        ];
        let ranker = HybridRanker::new(Arc::new(provider));

        let result = ranker.rank(&corpus, &keyword("pool"));

        assert_eq!(result.ids(), vec![1, 2]);
        assert_eq!(result.score_of(1), Some(0.0));
        assert_eq!(result.score_of(2), Some(0.0));
    }

    #[test]
    fn test_union_sorted_by_score_and_stable() {
        let provider = StaticEmbedding::new(vec![0.0, 1.0])
            .with("beach", vec![1.0, 0.0])
            .with("sandy coast ", vec![0.6, 0.8])
            .with("ocean front surf", vec![0.9, 0.43589])
            .with("beach bar ", vec![0.1, 0.99499])
            .with("city centre ", vec![0.0, 1.0])
            .with("near the beach ", vec![0.0, 1.0]);
        let corpus = vec![
            snapshot(1, "beach bar", &[]),
            snapshot(2, "sandy coast", &[]),
            snapshot(3, "city centre", &[]),
            snapshot(4, "ocean front", &["surf"]),
            snapshot(5, "near the beach", &[]),
        ];
        let ranker = HybridRanker::new(Arc::new(provider));

        let result = ranker.rank(&corpus, &keyword("beach"));

        // semantic: 4 (0.9), 2 (0.6); literal-only: 1 and 5 at 0, corpus order
        assert_eq!(result.ids(), vec![4, 2, 1, 5]);
        assert_eq!(result.degraded, None);
    }

    #[test]
    fn test_threshold_boundary_inclusive() {
        let keyword_vec = vec![1.0, 0.0];
        let hotel_vec = vec![0.3, 0.95];
        let sim = cosine_similarity(&keyword_vec, &hotel_vec).unwrap();
        let provider = Arc::new(
            StaticEmbedding::new(vec![0.0, 1.0])
                .with("view", keyword_vec)
                .with("harbour ", hotel_vec),
        );
        let corpus = vec![snapshot(1, "harbour", &[])];

        let ranker = HybridRanker::new(provider.clone()).with_threshold(sim);
        assert_eq!(ranker.rank(&corpus, &keyword("view")).ids(), vec![1]);

        let ranker = HybridRanker::new(provider).with_threshold(sim + 0.001);
        assert!(ranker.rank(&corpus, &keyword("view")).is_empty());
    }

    #[test]
    fn test_no_keyword_keeps_structured_order() {
        let corpus = vec![
            snapshot(1, "a", &["pool"]),
            snapshot(2, "b", &["pool", "gym"]),
            snapshot(3, "c", &[]),
        ];
        let provider = Arc::new(StaticEmbedding::new(vec![1.0]));
        let ranker = HybridRanker::new(provider.clone());

        let all = ranker.rank(&corpus, &SearchFilters::default());
        assert_eq!(all.ids(), vec![1, 2, 3]);
        assert!(all.hotels.iter().all(|h| h.score == 0.0));

        let filters = SearchFilters {
            amenities: vec!["pool".to_string(), "gym".to_string()],
            keyword: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(ranker.rank(&corpus, &filters).ids(), vec![2, 1]);

        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_no_candidates_skips_embedding() {
        let corpus = vec![snapshot(1, "spa", &["spa"])];
        let provider = Arc::new(StaticEmbedding::new(vec![1.0]));
        let ranker = HybridRanker::new(provider.clone());

        let filters = SearchFilters {
            min_rating: Some(5.0),
            keyword: Some("spa".to_string()),
            ..Default::default()
        };
        let result = ranker.rank(&corpus, &filters);

        assert!(result.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_model_unavailable_degrades_to_structured() {
        let mut corpus = vec![
            snapshot(1, "hill station", &["spa"]),
            snapshot(2, "beach hut", &["wifi"]),
        ];
        corpus[1].hotel.location = "Goa".to_string();
        corpus[0].hotel.location = "Goa".to_string();

        let ranker = HybridRanker::new(Arc::new(UnavailableEmbedding::new("offline")));
        let filters = SearchFilters {
            location: Some("goa".to_string()),
            keyword: Some("spa".to_string()),
            ..Default::default()
        };

        let result = ranker.rank(&corpus, &filters);

        assert_eq!(result.ids(), vec![1, 2]);
        assert_eq!(result.degraded, Some(Degradation::ModelUnavailable));
    }

    #[test]
    fn test_dimension_mismatch_degrades() {
        let provider = StaticEmbedding::new(vec![1.0, 0.0, 0.0]).with("spa", vec![1.0, 0.0]);
        let corpus = vec![snapshot(1, "spa resort", &[])];
        let ranker = HybridRanker::new(Arc::new(provider));

        let result = ranker.rank(&corpus, &keyword("spa"));

        assert_eq!(result.ids(), vec![1]);
        assert_eq!(result.degraded, Some(Degradation::DimensionMismatch));
    }

    #[test]
    fn test_duplicate_ids_collapsed() {
        let corpus = vec![
            snapshot(1, "spa", &[]),
            snapshot(1, "spa", &[]),
            snapshot(2, "spa", &[]),
        ];
        let ranker = HybridRanker::new(Arc::new(VocabEmbedding::hotels()));

        assert_eq!(ranker.rank(&corpus, &keyword("spa")).ids(), vec![1, 2]);
        assert_eq!(ranker.rank(&corpus, &SearchFilters::default()).ids(), vec![1, 2]);
    }

    #[test]
    fn test_cache_reused_across_searches() {
        let provider = Arc::new(StaticEmbedding::new(vec![1.0, 0.0]));
        let cache = Arc::new(EmbeddingCache::new());
        let ranker = HybridRanker::new(provider.clone()).with_cache(cache.clone());
        let corpus = vec![snapshot(1, "a", &[]), snapshot(2, "b", &[])];

        ranker.rank(&corpus, &keyword("x"));
        // keyword + two hotels
        assert_eq!(provider.calls(), 3);

        ranker.rank(&corpus, &keyword("y"));
        // only the keyword is embedded again
        assert_eq!(provider.calls(), 4);
        assert_eq!(cache.len(), 2);
    }
}
