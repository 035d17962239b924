//! Configuration loader, typed settings and path helpers.
//!
//! Figment merges serialized defaults, `config.toml`, `config.<env>.toml`
//! (selected by `RUST_ENV`) and `APP_*` environment variables, in that order.
//! Nested keys use a double underscore in the environment, for example
//! `APP_RETRIEVAL__TOP_K=7`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::SearchMode;

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> Result<Self> {
        Self::load_in(Path::new("."))
    }

    /// Load `config.toml` and its per-environment overlay from `base`.
    pub fn load_in(base: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name };
        config.validate_for_env()?;
        Ok(config)
    }

    /// Wrap an already-assembled figment, mainly for tests.
    pub fn from_figment(figment: Figment, env_name: &str) -> Result<Self> {
        let config = Self { figment, env_name: env_name.to_string() };
        config.validate_for_env()?;
        Ok(config)
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to extract settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self) -> Result<()> {
        let settings = self.settings()?;
        match self.env_name.as_str() {
            "prod" | "production" => {
                if settings.embedding.use_fake {
                    return Err(Error::InvalidConfig(
                        "embedding.use_fake must be false in production".to_string(),
                    ));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub vector: VectorSettings,
    pub lexical: LexicalSettings,
    pub retrieval: RetrievalSettings,
    pub data: DataSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 {
            return Err(Error::InvalidConfig("chunking.size must be positive".to_string()));
        }
        if self.chunking.overlap >= self.chunking.size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.size ({})",
                self.chunking.overlap, self.chunking.size
            )));
        }
        if self.vector.dimension == 0 {
            return Err(Error::InvalidConfig("vector.dimension must be positive".to_string()));
        }
        if self.vector.connect_attempts == 0 {
            return Err(Error::InvalidConfig("vector.connect_attempts must be at least 1".to_string()));
        }
        if self.retrieval.top_k == 0 || self.retrieval.max_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k and retrieval.max_k must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Target chunk length in characters.
    pub size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { size: 1000, overlap: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Directory holding `config.json`, `tokenizer.json` and the model weights.
    pub model_dir: String,
    /// Token budget per input; longer inputs are truncated.
    pub max_len: usize,
    /// Use the hashed embedder instead of loading a model.
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: "models/all-MiniLM-L6-v2".to_string(), max_len: 256, use_fake: false }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Lance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub backend: StoreBackend,
    /// JSON snapshot for the memory backend; `None` keeps it purely in-process.
    pub snapshot_path: Option<String>,
    pub lance_uri: String,
    pub collection: String,
    pub dimension: usize,
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            snapshot_path: Some("data/vector_store/rag_documents.json".to_string()),
            lance_uri: "data/vector_store/lancedb".to_string(),
            collection: "rag_documents".to_string(),
            dimension: 384,
            connect_attempts: 3,
            connect_backoff_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalSettings {
    /// Maximum number of stored points read when rebuilding the index.
    pub scan_limit: usize,
    pub k1: f32,
    pub b: f32,
    pub epsilon: f32,
}

impl Default for LexicalSettings {
    fn default() -> Self {
        Self { scan_limit: 1000, k1: 1.5, b: 0.75, epsilon: 0.25 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub mode: SearchMode,
    pub top_k: usize,
    pub max_k: usize,
    /// Rank offset of reciprocal rank fusion.
    pub rrf_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { mode: SearchMode::Hybrid, top_k: 5, max_k: 10, rrf_k: 60 }
    }
}

impl RetrievalSettings {
    /// Clamp a requested result count into `[1, max_k]`.
    pub fn clamp_k(&self, k: usize) -> usize {
        k.clamp(1, self.max_k)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub upload_dir: String,
    /// Where per-document chunk dumps are written; `None` disables them.
    pub debug_dir: Option<String>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            upload_dir: "data/uploaded_docs".to_string(),
            debug_dir: Some("data/vector_database_debug".to_string()),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against `base` after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
