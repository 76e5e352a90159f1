//! TOML configuration and the generation backend credential.
//!
//! The config file is optional: when the default path does not exist the
//! built-in defaults are used. The API key is never read from the file; it
//! comes from the process environment once at startup (see [`Credentials`]).

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;

/// Environment variable holding the generation backend API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    /// Inserted between consecutive documents in the context blob.
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            include_globs: default_include_globs(),
            separator: default_separator(),
            max_context_chars: default_max_context_chars(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("documents")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.docx".to_string()]
}
fn default_separator() -> String {
    "\n\n".to_string()
}
fn default_max_context_chars() -> usize {
    48_000
}
fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    /// Bound on a single backend attempt when retries are enabled.
    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,
}

impl GenerationConfig {
    /// Configured per-attempt bound, or the query budget split evenly
    /// across `max_retries + 1` attempts (at least one second).
    pub fn attempt_timeout_secs(&self) -> u64 {
        self.attempt_timeout_secs.unwrap_or_else(|| {
            (self.timeout_secs / (u64::from(self.max_retries) + 1)).max(1)
        })
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            attempt_timeout_secs: None,
        }
    }
}

fn default_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

/// Loads and validates the config file. With `required == false` a missing
/// file yields the defaults.
pub fn load_config(path: &Path, required: bool) -> Result<Config> {
    let config = if !required && !path.exists() {
        Config::default()
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.documents.include_globs.is_empty() {
        bail!("documents.include_globs must not be empty");
    }
    for pattern in &config.documents.include_globs {
        Glob::new(pattern)
            .with_context(|| format!("invalid documents.include_globs pattern: {}", pattern))?;
    }
    if config.documents.max_context_chars == 0 {
        bail!("documents.max_context_chars must be > 0");
    }
    if config.documents.max_file_bytes == 0 {
        bail!("documents.max_file_bytes must be > 0");
    }
    if config.generation.timeout_secs == 0 {
        bail!("generation.timeout_secs must be > 0");
    }
    if let Some(secs) = config.generation.attempt_timeout_secs {
        if secs == 0 || secs > config.generation.timeout_secs {
            bail!("generation.attempt_timeout_secs must be in 1..=generation.timeout_secs");
        }
    }
    if config.generation.model.trim().is_empty() {
        bail!("generation.model must not be empty");
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }
    Ok(())
}

/// Secret material for the generation backend.
///
/// Built once at process start and handed to the backend's constructor.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Reads [`API_KEY_VAR`]. Missing or blank is fatal.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(ConfigurationError::MissingCredential(API_KEY_VAR)),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
