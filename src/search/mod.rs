//! Hybrid hotel search.
//!
//! Combines structured filters (location, rating, price, amenities) with a
//! keyword ranking that unions literal substring matches and semantic
//! matches scored by embedding similarity.
//!
//! # Architecture
//!
//! - `embeddings`: embedding providers (local fastembed model, remote service)
//! - `similarity`: cosine similarity between embedding vectors
//! - `cache`: content-addressed cache of hotel embeddings
//! - `preprocess`: builds the text a hotel is embedded from
//! - `filters`: query parameter parsing and structured filtering
//! - `ranker`: the hybrid ranker tying everything together

pub mod cache;
pub mod embeddings;
pub mod filters;
mod preprocess;
pub mod ranker;
pub mod similarity;

pub use cache::EmbeddingCache;
pub use embeddings::{
    EmbeddingError, EmbeddingProvider, LazyEmbedding, RemoteEmbedding, UnavailableEmbedding,
};
pub use filters::{FilterParams, SearchFilters};
pub use ranker::{Degradation, HotelSnapshot, HybridRanker};

/// Default embedding model, the sentence-transformers MiniLM.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Minimum similarity for a hotel to join the semantic set.
pub const DEFAULT_THRESHOLD: f32 = 0.3;
