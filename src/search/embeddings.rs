//! Embedding providers.
//!
//! - `EmbeddingModel`: local ONNX model through fastembed, loaded once
//! - `LazyEmbedding`: defers loading an `EmbeddingModel` until the first keyword search
//! - `RemoteEmbedding`: OpenAI-compatible HTTP embedding endpoint with a timeout
//! - `UnavailableEmbedding`: stands in when semantic search is off or the model failed to load

use fastembed::{InitOptions, TextEmbedding};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Turns free text into a fixed-length vector.
///
/// Implementations are shared across request threads, so `embed` takes `&self`.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifies the model; vectors from different names are not comparable.
    fn name(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("invalid model name: {0}")]
    InvalidModel(String),
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
}

impl EmbeddingModel {
    /// Load the named model, downloading it into `cache_dir/models` on first use.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_enum = Self::parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;

        log::info!("loaded embedding model '{model_name}' ({dimensions} dimensions)");

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
        })
    }

    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            _ => Err(EmbeddingError::InvalidModel(format!(
                "unknown model: {}. Supported models: all-MiniLM-L6-v2, all-MiniLM-L6-v2-q, bge-small-en-v1.5, bge-base-en-v1.5",
                name
            ))),
        }
    }

    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let probe = model.embed(vec!["hotel"], None).map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("failed to probe dimensions: {}", e))
        })?;

        probe
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::ModelUnavailable("model returned no embedding".into()))
    }
}

impl EmbeddingProvider for EmbeddingModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::ModelUnavailable("no embedding returned".to_string()))
    }
}

/// Embedding service reached over HTTP.
///
/// Speaks the OpenAI-style `{"model", "input"} -> {"data": [{"embedding"}]}` shape.
/// Every call is bounded by `timeout`; timeouts and transport errors surface as
/// `ModelUnavailable` so the ranker can fall back to structured filtering.
pub struct RemoteEmbedding {
    client: reqwest::blocking::Client,
    url: String,
    model_name: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct RemoteResponse {
    data: Vec<RemoteItem>,
}

#[derive(Deserialize)]
struct RemoteItem {
    embedding: Vec<f32>,
}

impl RemoteEmbedding {
    pub fn new(url: &str, model_name: &str, timeout: Duration) -> Result<Self, EmbeddingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            model_name: model_name.to_string(),
            timeout,
        })
    }
}

impl EmbeddingProvider for RemoteEmbedding {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "model": self.model_name, "input": text }))
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| {
                if err.is_timeout() {
                    EmbeddingError::ModelUnavailable(format!(
                        "embedding service timed out after {}ms",
                        self.timeout.as_millis()
                    ))
                } else {
                    EmbeddingError::ModelUnavailable(err.to_string())
                }
            })?;

        let body: RemoteResponse = response
            .json()
            .map_err(|e| EmbeddingError::ModelUnavailable(format!("malformed response: {e}")))?;

        body.data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| EmbeddingError::ModelUnavailable("no embedding returned".to_string()))
    }
}

/// Local model loaded on the first `embed` call.
///
/// Commands that never rank by keyword never pay for loading or downloading
/// the model. A failed load is remembered and reported on every later call.
pub struct LazyEmbedding {
    model_name: String,
    cache_dir: PathBuf,
    state: Mutex<Option<Result<Arc<EmbeddingModel>, String>>>,
}

impl LazyEmbedding {
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Self {
        Self {
            model_name: model_name.to_string(),
            cache_dir,
            state: Mutex::new(None),
        }
    }

    fn model(&self) -> Result<Arc<EmbeddingModel>, EmbeddingError> {
        let mut guard = self.state.lock().map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("failed to acquire model lock: {}", e))
        })?;

        let state = guard.get_or_insert_with(|| {
            log::info!("initializing embedding model '{}'", self.model_name);
            EmbeddingModel::new(&self.model_name, self.cache_dir.clone())
                .map(Arc::new)
                .map_err(|err| {
                    log::error!("failed to load embedding model: {err}");
                    err.to_string()
                })
        });

        state
            .clone()
            .map_err(EmbeddingError::ModelUnavailable)
    }
}

impl EmbeddingProvider for LazyEmbedding {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.model()?.embed(text)
    }
}

/// Provider that always fails, used when semantic search cannot run.
pub struct UnavailableEmbedding {
    reason: String,
}

impl UnavailableEmbedding {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl EmbeddingProvider for UnavailableEmbedding {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::ModelUnavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires model download"]
    fn test_model_creation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = EmbeddingModel::new("all-MiniLM-L6-v2", temp_dir.path().to_path_buf())
            .unwrap();

        assert_eq!(model.name(), "all-MiniLM-L6-v2");

        let embedding = model.embed("A luxurious hotel in the heart of New York.").unwrap();
        assert_eq!(embedding.len(), 384);
    }

    #[test]
    fn test_invalid_model_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = EmbeddingModel::new("nonexistent-model", temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
    }

    #[test]
    fn test_lazy_load_failure_is_model_unavailable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = LazyEmbedding::new("nonexistent-model", temp_dir.path().to_path_buf());

        // nothing is loaded until the first embed
        assert!(!temp_dir.path().join("models").exists());

        for _ in 0..2 {
            let result = provider.embed("spa");
            assert!(matches!(result, Err(EmbeddingError::ModelUnavailable(ref reason)) if reason.contains("unknown model")));
        }
        assert_eq!(provider.name(), "nonexistent-model");
    }

    #[test]
    fn test_unavailable_always_fails() {
        let provider = UnavailableEmbedding::new("semantic search disabled");
        let err = provider.embed("spa").unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelUnavailable(ref reason) if reason == "semantic search disabled"));
    }

    #[test]
    fn test_remote_unreachable_is_model_unavailable() {
        // nothing listens on the discard port
        let provider = RemoteEmbedding::new(
            "http://127.0.0.1:9/v1/embeddings",
            "all-MiniLM-L6-v2",
            Duration::from_millis(500),
        )
        .unwrap();

        let result = provider.embed("beach resort");
        assert!(matches!(result, Err(EmbeddingError::ModelUnavailable(_))));
        assert_eq!(provider.name(), "all-MiniLM-L6-v2");
    }
}
