//! Text embedding for dense retrieval: a local XLM-RoBERTa encoder (BGE-M3
//! weights) run with candle, and a hashing stand-in for tests.

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use compass_core::config::{expand_path, EmbeddingSettings};
pub use compass_core::traits::Embedder;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

pub const DEFAULT_MAX_LEN: usize = 256;
pub const FAKE_DIM: usize = 1024;
const BATCH_SIZE: usize = 16;

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    id: String,
}

impl EmbeddingModel {
    /// Loads `tokenizer.json`, `config.json` and `pytorch_model.bin` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;

        let id = model_dir.file_name().map_or_else(|| "local-model".to_string(), |n| n.to_string_lossy().into_owned());
        tracing::info!(model = %id, dim, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len: DEFAULT_MAX_LEN, id })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((texts.len(), self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        tracing::debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(vectors)
    }
}

impl Embedder for EmbeddingModel {
    fn id(&self) -> String { self.id.clone() }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) { out.extend(self.embed_chunk(batch)?); }
        Ok(out)
    }
}

/// Deterministic bag-of-tokens vectors: each whitespace token is hashed into
/// one dimension. Similar wording gives similar vectors, nothing more.
#[derive(Debug, Clone)]
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            v[0] = 1.0;
            return v;
        }
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn id(&self) -> String { format!("fake-xxhash-{}", self.dim) }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { DEFAULT_MAX_LEN }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// The fake embedder when `use_fake` is set (or `APP_USE_FAKE_EMBEDDINGS=1`),
/// otherwise the local model.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.use_fake || env_flag("APP_USE_FAKE_EMBEDDINGS") {
        tracing::info!(dim = FAKE_DIM, "using fake embedder");
        return Ok(Box::new(FakeEmbedder::new(FAKE_DIM)));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref())?;
    Ok(Box::new(EmbeddingModel::load(&dir)?))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let candidates = configured
        .map(expand_path)
        .into_iter()
        .chain(["APP_MODEL_DIR", "MODEL_DIR"].into_iter().filter_map(|var| std::env::var(var).ok().map(PathBuf::from)))
        .chain([PathBuf::from("models/bge-m3"), PathBuf::from("../models/bge-m3")]);
    for dir in candidates {
        if dir.exists() { return Ok(dir); }
        tracing::debug!(dir = %dir.display(), "model dir candidate missing");
    }
    Err(anyhow!("Could not locate the embedding model directory; set embedding.model_dir or APP_MODEL_DIR"))
}
