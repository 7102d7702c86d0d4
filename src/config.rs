//! Configuration loading and validation.
//!
//! docchat reads an optional TOML file. Every section and every key has a
//! default, so an empty file (or no `--config` flag at all) is a valid
//! configuration.
//!
//! ```toml
//! [chunking]
//! target_size = 800
//! overlap = 150
//!
//! [retrieval]
//! top_k = 4
//! max_context_chars = 3000
//! min_relevance_score = 0.05
//!
//! [chat]
//! personality = "researcher"
//!
//! [generation]
//! provider = "openai"
//! model = "mistralai/mistral-7b-instruct"
//! ```
//!
//! [`load_config`] rejects invalid values instead of clamping them.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use docchat_core::chunk::ChunkParams;
use docchat_core::index::IndexParams;
use docchat_core::personality::Personality;
use docchat_core::retrieval::RetrievalParams;
use docchat_core::session::SessionSettings;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_target_size() -> usize {
    800
}
fn default_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Vocabulary cap; `0` means unbounded.
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default)]
    pub stop_words: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            sublinear_tf: false,
            stop_words: false,
        }
    }
}

fn default_max_features() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            min_relevance_score: default_min_relevance_score(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_max_context_chars() -> usize {
    3000
}
fn default_min_relevance_score() -> f64 {
    0.05
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_personality")]
    pub personality: String,
    #[serde(default = "default_analysis_max_chars")]
    pub analysis_max_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            personality: default_personality(),
            analysis_max_chars: default_analysis_max_chars(),
        }
    }
}

fn default_history_window() -> usize {
    6
}
fn default_personality() -> String {
    "general".to_string()
}
fn default_analysis_max_chars() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Applied when a directory is given on the command line.
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_include_globs() -> Vec<String> {
    ["pdf", "docx", "pptx", "xlsx", "txt", "text", "log", "csv", "md", "markdown"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

impl Config {
    pub fn personality(&self) -> Result<Personality> {
        Ok(self.chat.personality.parse::<Personality>()?)
    }

    /// Core session settings derived from this config.
    pub fn session_settings(&self) -> Result<SessionSettings> {
        let chunking = ChunkParams::new(self.chunking.target_size, self.chunking.overlap)
            .context("invalid [chunking] section")?;
        let retrieval = RetrievalParams {
            top_k: self.retrieval.top_k,
            max_context_chars: self.retrieval.max_context_chars,
            min_relevance_score: self.retrieval.min_relevance_score,
        };
        retrieval.validate().context("invalid [retrieval] section")?;

        Ok(SessionSettings {
            chunking,
            index: IndexParams {
                max_features: (self.index.max_features > 0).then_some(self.index.max_features),
                sublinear_tf: self.index.sublinear_tf,
                stop_words: self.index.stop_words,
            },
            retrieval,
            history_window: self.chat.history_window,
            generation_timeout: Duration::from_secs(self.generation.timeout_secs),
            analysis_max_chars: self.chat.analysis_max_chars,
            personality: self.personality()?,
        })
    }
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if given, otherwise validate and return defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Chunk, retrieval and personality checks
    config.session_settings()?;

    if config.chat.analysis_max_chars == 0 {
        bail!("chat.analysis_max_chars must be > 0");
    }
    if config.ingest.max_file_bytes == 0 {
        bail!("ingest.max_file_bytes must be > 0");
    }

    let generation = &config.generation;
    match generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if generation.is_enabled() {
        if generation.model.as_deref().map_or(true, str::is_empty) {
            bail!(
                "generation.model must be specified when provider is '{}'",
                generation.provider
            );
        }
        if generation.timeout_secs == 0 {
            bail!("generation.timeout_secs must be > 0");
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }
    }

    Ok(())
}
