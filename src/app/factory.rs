use crate::{
    app::service::App,
    bookings,
    config::{Config, ProviderKind, SearchConfig},
    hotels,
    search::{
        EmbeddingCache, EmbeddingProvider, HybridRanker, LazyEmbedding, RemoteEmbedding,
        UnavailableEmbedding,
    },
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Load config and stores from `base_path` and wire them into an `App`.
    pub fn create_app(base_path: &str) -> Result<App> {
        std::fs::create_dir_all(base_path)
            .context("Failed to create application base directory")?;

        let config = Config::load_with(base_path)?;

        let hotel_mgr = Arc::new(hotels::BackendCsv::load(base_path)?);
        let booking_mgr = Arc::new(bookings::BackendCsv::load(base_path)?);

        let provider = Self::create_provider(&config.search, PathBuf::from(base_path));
        let ranker = Self::create_ranker(&config.search, provider);

        Ok(App::new(hotel_mgr, booking_mgr, ranker, config))
    }

    /// Embedding provider described by the search config.
    ///
    /// Never fails: a provider that cannot be built is replaced by one that
    /// reports the model as unavailable, which keeps searches on structured
    /// filters only.
    pub fn create_provider(config: &SearchConfig, base_path: PathBuf) -> Arc<dyn EmbeddingProvider> {
        if !config.semantic_enabled {
            log::info!("semantic search disabled, keyword searches use structured filters only");
            return Arc::new(UnavailableEmbedding::new("semantic search disabled"));
        }

        match (config.provider, &config.remote_url) {
            (ProviderKind::Remote, Some(url)) => {
                let timeout = Duration::from_millis(config.remote_timeout_ms);
                match RemoteEmbedding::new(url, &config.model, timeout) {
                    Ok(provider) => {
                        log::info!("using remote embeddings at {url}");
                        Arc::new(provider)
                    }
                    Err(err) => {
                        log::warn!("remote embeddings unavailable: {err}");
                        Arc::new(UnavailableEmbedding::new(err.to_string()))
                    }
                }
            }
            (ProviderKind::Remote, None) => {
                log::warn!("search.remote_url not set");
                Arc::new(UnavailableEmbedding::new("search.remote_url not set"))
            }
            (ProviderKind::Local, _) => Arc::new(LazyEmbedding::new(&config.model, base_path)),
        }
    }

    pub fn create_ranker(config: &SearchConfig, provider: Arc<dyn EmbeddingProvider>) -> HybridRanker {
        let ranker = HybridRanker::new(provider).with_threshold(config.threshold);
        log::debug!(
            "keyword ranking with '{}' at threshold {}",
            ranker.provider_name(),
            ranker.threshold()
        );

        if config.cache_embeddings {
            ranker.with_cache(Arc::new(EmbeddingCache::new()))
        } else {
            ranker
        }
    }

    /// Get the base path for the application
    pub fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("STAYS_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;

        Ok(format!("{}/.local/share/stays", home.to_string_lossy()))
    }
}
