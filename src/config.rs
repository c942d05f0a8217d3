use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 500;
pub const DEFAULT_SOURCE_LOCALE: &str = "en_US";
pub const DEFAULT_SKIP_LOCALES: &str = "tok";
pub const DEFAULT_LOCALIZATIONS_DIR: &str = "localizations";
pub const DEFAULT_INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone)]
pub struct Config {
    // Provider
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,

    // Batching
    pub batch_size: usize,
    pub batch_delay: Duration,

    // Locales
    pub source_locale: String,
    pub skip_locales: Vec<String>,
    pub localizations_dir: PathBuf,
    pub index_file: PathBuf,

    // Prompt
    pub translation_context: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let batch_size = std::env::var("TRANSLATION_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            bail!("TRANSLATION_BATCH_SIZE must be at least 1");
        }

        Ok(Self {
            // Provider - the key is only checked when a command needs it
            api_key: std::env::var("TRANSLATION_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            api_url: std::env::var("TRANSLATION_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            model: std::env::var("TRANSLATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            max_tokens: std::env::var("TRANSLATION_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_TOKENS),
            request_timeout: Duration::from_secs(
                std::env::var("TRANSLATION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),

            // Batching
            batch_size,
            batch_delay: Duration::from_millis(
                std::env::var("TRANSLATION_BATCH_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_BATCH_DELAY_MS),
            ),

            // Locales
            source_locale: std::env::var("SOURCE_LOCALE")
                .unwrap_or_else(|_| DEFAULT_SOURCE_LOCALE.to_string()),
            skip_locales: parse_list(
                &std::env::var("SKIP_LOCALES").unwrap_or_else(|_| DEFAULT_SKIP_LOCALES.to_string()),
            ),
            localizations_dir: PathBuf::from(
                std::env::var("LOCALIZATIONS_DIR")
                    .unwrap_or_else(|_| DEFAULT_LOCALIZATIONS_DIR.to_string()),
            ),
            index_file: PathBuf::from(
                std::env::var("INDEX_FILE").unwrap_or_else(|_| DEFAULT_INDEX_FILE.to_string()),
            ),

            // Prompt
            translation_context: std::env::var("TRANSLATION_CONTEXT")
                .ok()
                .filter(|c| !c.trim().is_empty()),
        })
    }

    /// The provider API key, or a configuration error when it is missing.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("TRANSLATION_API_KEY not set")
    }

    /// Resolve relative file locations against `root`.
    pub fn with_root(mut self, root: &Path) -> Self {
        if self.localizations_dir.is_relative() {
            self.localizations_dir = root.join(&self.localizations_dir);
        }
        if self.index_file.is_relative() {
            self.index_file = root.join(&self.index_file);
        }
        self
    }

    /// Path of the persisted file for a locale code.
    pub fn locale_file(&self, code: &str) -> PathBuf {
        self.localizations_dir.join(format!("{}.json", code))
    }

    /// Path of the source locale file.
    pub fn source_file(&self) -> PathBuf {
        self.locale_file(&self.source_locale)
    }

    /// Whether a locale is never auto-translated.
    pub fn is_skipped(&self, code: &str) -> bool {
        code == self.source_locale || self.skip_locales.iter().any(|s| s == code)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
