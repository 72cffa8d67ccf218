//! Configuration loading and validation.
//!
//! The whole application works from one [`Config`] value constructed in
//! `main`: the optional `notebot.toml` settings file provides the baseline,
//! CLI flags override it, and the OpenAI API key is resolved once (flag, then
//! process environment, then a local `.env` file). No other module reads the
//! process environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Fixed default notes repository, used when neither the CLI flag nor the
/// settings file names one.
pub const DEFAULT_NOTE_REPO_URL: &str = "https://github.com/slangenbach/notes.git";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub notes: NotesConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Resolved at startup, never read from the environment elsewhere.
    /// `None` means downstream API calls fail with an authentication error
    /// at first use; startup does not validate the credential.
    #[serde(skip)]
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotesConfig {
    #[serde(default = "default_repo_url")]
    pub repo_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_shallow")]
    pub shallow: bool,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            repo_url: default_repo_url(),
            branch: default_branch(),
            shallow: default_shallow(),
        }
    }
}

fn default_repo_url() -> String {
    DEFAULT_NOTE_REPO_URL.to_string()
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_shallow() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question. The default of 4 is the
    /// retriever default inherited from the original stack, pinned here so
    /// answers are reproducible across deployments.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            batch_size: default_batch_size(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_api_base() -> String {
    "https://api.openai.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// The only accepted value is `gpt`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Must be 0.0: answers are generated deterministically.
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_llm_model(),
            temperature: 0.0,
            max_tokens: default_llm_max_tokens(),
            api_base: default_api_base(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "gpt".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_max_tokens() -> usize {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    60
}

/// CLI overrides applied on top of the settings file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub note_repo_url: Option<String>,
    pub llm: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Config {
    /// Local checkout of the notes repository.
    pub fn notes_path(&self) -> PathBuf {
        self.data.dir.join("notes")
    }

    /// Serialized vector index.
    pub fn index_path(&self) -> PathBuf {
        self.data.dir.join("db").join("index.sqlite")
    }
}

/// Load configuration: settings file (if present), then CLI overrides, then
/// API-key resolution. Validates before returning.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<Config> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?
    } else {
        String::new()
    };

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Some(ref url) = overrides.note_repo_url {
        config.notes.repo_url = url.clone();
    }
    if let Some(ref provider) = overrides.llm {
        config.llm.provider = provider.clone();
    }

    config.openai_api_key = resolve_api_key(overrides.openai_api_key.as_deref());

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.notes.repo_url.is_empty() {
        anyhow::bail!("notes.repo_url must not be empty");
    }

    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.model.is_empty() {
        anyhow::bail!("embedding.model must not be empty");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if !config.llm.provider.eq_ignore_ascii_case("gpt") {
        anyhow::bail!(
            "Unknown LLM provider: '{}'. Must be gpt.",
            config.llm.provider
        );
    }
    if config.llm.temperature != 0.0 {
        anyhow::bail!("llm.temperature must be 0.0 (answers are generated deterministically)");
    }
    if config.llm.max_tokens == 0 {
        anyhow::bail!("llm.max_tokens must be > 0");
    }

    Ok(())
}

/// Resolve the OpenAI API key: CLI flag, then the process environment, then a
/// local `.env` file. An empty value at any level falls through to the next.
fn resolve_api_key(flag: Option<&str>) -> Option<String> {
    if let Some(key) = flag {
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            return Some(key);
        }
    }

    read_env_file(Path::new(".env"), "OPENAI_API_KEY")
}

/// Minimal `.env` reader: `KEY=VALUE` lines, `#` comments, optional `export `
/// prefix and surrounding quotes.
fn read_env_file(path: &Path, wanted: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        if let Some((key, value)) = line.split_once('=') {
            if key.trim() != wanted {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}
