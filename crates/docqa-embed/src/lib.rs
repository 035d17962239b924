use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use docqa_core::config::{expand_path, EmbeddingSettings};
use docqa_core::traits::Embedder;

pub mod hashed;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use hashed::HashEmbedder;
pub use model::BertEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// Pick the embedder for this process.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` (or `embedding.use_fake`) selects the hashed
/// embedder at `dim`; otherwise the sentence encoder is loaded from disk and a
/// failure to do so is returned to the caller.
pub fn get_default_embedder(settings: &EmbeddingSettings, dim: usize) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(settings.use_fake);
    if use_fake {
        info!(dim, "using hashed embedder");
        return Ok(Box::new(HashEmbedder::new(dim)));
    }
    let model_dir = resolve_model_dir(settings);
    Ok(Box::new(BertEmbedder::load(&model_dir, settings.max_len)?))
}

fn resolve_model_dir(settings: &EmbeddingSettings) -> PathBuf {
    match std::env::var("APP_MODEL_DIR") {
        Ok(dir) if !dir.is_empty() => expand_path(dir),
        _ => expand_path(&settings.model_dir),
    }
}
