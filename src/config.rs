use crate::search::{DEFAULT_MODEL, DEFAULT_THRESHOLD};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, path::Path};

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 2000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// fastembed model, downloaded into `<base>/models` on first use
    #[default]
    Local,
    /// OpenAI-style `/embeddings` endpoint
    Remote,
}

/// Configuration of the keyword ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// When off, keyword searches run on structured filters only
    #[serde(default = "default_true")]
    pub semantic_enabled: bool,

    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Minimum cosine similarity for a semantic match [-1.0, 1.0]
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Keep hotel embeddings in memory between searches
    #[serde(default = "default_true")]
    pub cache_embeddings: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_enabled: true,
            provider: ProviderKind::Local,
            model: DEFAULT_MODEL.to_string(),
            threshold: DEFAULT_THRESHOLD,
            remote_url: None,
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            cache_embeddings: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_remote_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_MS
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_recommendation_limit() -> usize {
    DEFAULT_RECOMMENDATION_LIMIT
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: usize,
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            recommendation_limit: DEFAULT_RECOMMENDATION_LIMIT,
            search: SearchConfig::default(),
            base_path: String::new(),
        }
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        let search = &self.search;
        if !(-1.0..=1.0).contains(&search.threshold) {
            bail!(
                "search.threshold must be between -1.0 and 1.0, got {}",
                search.threshold
            );
        }

        if search.remote_timeout_ms == 0 {
            bail!("search.remote_timeout_ms must be greater than 0");
        }

        if search.provider == ProviderKind::Remote && search.remote_url.is_none() {
            bail!("search.provider is remote but search.remote_url is not set");
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let path = Path::new(base_path).join("config.yaml");

        // create new if does not exist
        let config_str = match std::fs::read_to_string(&path) {
            Ok(config_str) => config_str,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("writing default config to {}", path.display());
                let config_str = serde_yml::to_string(&Self::default())?;
                std::fs::write(&path, &config_str)?;
                config_str
            }
            Err(err) => Err(err).context("couldnt read config.yaml")?,
        };

        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(Path::new(&self.base_path).join("config.yaml"), config_str)?;
        Ok(())
    }
}
