use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    /// `config.toml`, then `config.<env>.toml`, then `APP_*` variables, all
    /// relative to the working directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(base: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let config = Self { figment: Self::file_layers(base, &env_name).merge(Env::prefixed("APP_").split("__")) };
        config.settings()?;
        Ok(config)
    }

    fn file_layers(base: &Path, env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(base.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment
    }

    /// Configuration from an in-memory TOML document layered over defaults.
    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The whole typed configuration, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub fusion: FusionPolicy,
    pub embedding: EmbeddingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        self.fusion.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub docs_jsonl: String,
    pub index_dir: String,
    pub table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            docs_jsonl: "data/index/docs.jsonl".to_string(),
            index_dir: "data/index/lancedb".to_string(),
            table: "course_chunks".to_string(),
        }
    }
}

impl DataSettings {
    pub fn docs_jsonl_path(&self) -> PathBuf { expand_path(&self.docs_jsonl) }
    pub fn index_path(&self) -> PathBuf { expand_path(&self.index_dir) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_sources: usize,
    pub low_confidence_threshold: f32,
    pub max_context_chars: usize,
    pub search_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 8, max_sources: 3, low_confidence_threshold: 0.25, max_context_chars: 12_000, search_timeout_ms: 2_000 }
    }
}

impl RetrievalSettings {
    pub fn search_timeout(&self) -> Duration { Duration::from_millis(self.search_timeout_ms) }
}

/// Weights and query-pattern boosts applied when fusing the two signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionPolicy {
    pub dense_weight: f32,
    pub lexical_weight: f32,
    /// Flat boost for "where / which module / find" queries.
    pub locator_boost: f32,
    /// Flat boost for course-materials queries.
    pub materials_boost: f32,
    /// Per-result boost, materials queries only, when the chunk itself mentions materials.
    pub materials_term_boost: f32,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self { dense_weight: 0.6, lexical_weight: 0.4, locator_boost: 0.15, materials_boost: 0.20, materials_term_boost: 0.25 }
    }
}

impl FusionPolicy {
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("dense_weight", self.dense_weight),
            ("lexical_weight", self.lexical_weight),
            ("locator_boost", self.locator_boost),
            ("materials_boost", self.materials_boost),
            ("materials_term_boost", self.materials_term_boost),
        ];
        for (name, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!("fusion.{name} must be within [0, 1], got {value}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_course_setup() {
        let settings = Config::from_toml_str("").settings().expect("defaults");
        assert_eq!(settings.chunking.target_size, 1200);
        assert_eq!(settings.chunking.overlap, 200);
        assert_eq!(settings.retrieval.top_k, 8);
        assert_eq!(settings.retrieval.max_sources, 3);
        assert_eq!(settings.fusion, FusionPolicy::default());
        assert!(!settings.embedding.use_fake);
    }

    #[test]
    fn toml_overrides_single_keys() {
        let config = Config::from_toml_str("[retrieval]\ntop_k = 5\n\n[chunking]\ntarget_size = 400\noverlap = 50\n");
        let settings = config.settings().expect("settings");
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.retrieval.max_sources, 3);
        assert_eq!(settings.chunking.target_size, 400);
        assert_eq!(config.get::<usize>("chunking.overlap").expect("key"), 50);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_toml_str("[chunking]\ntarget_size = 100\noverlap = 100\n").settings().is_err());
        assert!(Config::from_toml_str("[fusion]\ndense_weight = 1.5\n").settings().is_err());
        assert!(Config::from_toml_str("[retrieval]\ntop_k = 0\n").settings().is_err());
    }

    #[test]
    fn load_from_reads_config_file() {
        let tmp = tempfile::tempdir().expect("tmp");
        std::fs::write(tmp.path().join("config.toml"), "[data]\ntable = \"chunks_v2\"\n").expect("write");
        let settings = Config::load_from(tmp.path()).expect("load").settings().expect("settings");
        assert_eq!(settings.data.table, "chunks_v2");
        assert_eq!(settings.data.index_dir, "data/index/lancedb");
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/compass");
        assert_eq!(resolve_with_base(base, "data/index"), PathBuf::from("/srv/compass/data/index"));
        assert_eq!(resolve_with_base(base, "/var/index"), PathBuf::from("/var/index"));
    }
}
