//! Content-addressed cache of hotel embeddings.
//!
//! Entries are keyed by hotel id and carry the SHA256 of the text they were
//! computed from. A lookup with a different hash is a miss, and the following
//! insert replaces the stale vector, so edited descriptions or amenity lists
//! are re-embedded without explicit invalidation.

use std::collections::HashMap;
use std::sync::RwLock;

use super::embeddings::{EmbeddingError, EmbeddingProvider};
use super::preprocess::content_hash;

#[derive(Debug, Clone)]
struct CacheEntry {
    content_hash: [u8; 32],
    embedding: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: RwLock<HashMap<u64, CacheEntry>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached vector for `id`, if it was computed from content with this hash.
    pub fn get(&self, id: u64, hash: &[u8; 32]) -> Option<Vec<f32>> {
        let entries = self.entries.read().ok()?;
        entries
            .get(&id)
            .filter(|entry| &entry.content_hash == hash)
            .map(|entry| entry.embedding.clone())
    }

    pub fn insert(&self, id: u64, hash: [u8; 32], embedding: Vec<f32>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                id,
                CacheEntry {
                    content_hash: hash,
                    embedding,
                },
            );
        }
    }

    pub fn remove(&self, id: u64) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&id);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached embedding of `text` for hotel `id`, computing and
    /// storing it with `provider` on a miss.
    pub fn get_or_embed(
        &self,
        id: u64,
        text: &str,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let hash = content_hash(text);
        if let Some(embedding) = self.get(id, &hash) {
            return Ok(embedding);
        }

        let embedding = provider.embed(text)?;
        self.insert(id, hash, embedding.clone());
        Ok(embedding)
    }
}
