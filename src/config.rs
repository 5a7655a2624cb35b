use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_provider")]
    pub provider: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    #[serde(default = "default_model_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_model_provider(),
            model: default_model_name(),
            base_url: default_model_base_url(),
            api_key_env: default_api_key_env(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

fn default_model_provider() -> String {
    "gemini".to_string()
}
fn default_model_name() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_model_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_max_output_tokens() -> u32 {
    3000
}
fn default_model_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            provider: default_retrieval_provider(),
            url: None,
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

fn default_retrieval_provider() -> String {
    "sqlite".to_string()
}
fn default_top_k() -> i64 {
    5
}
fn default_max_context_chars() -> usize {
    3000
}
fn default_retrieval_timeout_secs() -> u64 {
    30
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
    250
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_auth_mode")]
    pub mode: String,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: default_auth_mode(),
            tokens: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        self.mode != "disabled"
    }
}

fn default_auth_mode() -> String {
    "disabled".to_string()
}

/// A bearer token accepted by the server, stored as a SHA-256 hex digest.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenEntry {
    pub user_id: String,
    pub token_sha256: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: default_description(),
            font_family: default_font_family(),
        }
    }
}

fn default_title() -> String {
    "AI Legal PDF".to_string()
}
fn default_description() -> String {
    "AI Assistant for your Legal Documents".to_string()
}
fn default_font_family() -> String {
    "Inter".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info,tower_http=info,sqlx=warn".to_string()
}

impl Config {
    /// Config with defaults everywhere, rooted at the given database path.
    ///
    /// Used by tests and by embedders that build their configuration in code.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            server: ServerConfig {
                bind: "127.0.0.1:3000".to_string(),
            },
            model: ModelConfig::default(),
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
            auth: AuthConfig::default(),
            app: AppConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.model.provider.as_str() {
        "gemini" => {}
        other => anyhow::bail!("Unknown model provider: '{}'. Must be gemini.", other),
    }
    if config.model.max_output_tokens == 0 {
        anyhow::bail!("model.max_output_tokens must be > 0");
    }

    match config.retrieval.provider.as_str() {
        "sqlite" | "disabled" => {}
        "http" => {
            if config.retrieval.url.is_none() {
                anyhow::bail!("retrieval.url must be set when provider is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown retrieval provider: '{}'. Must be sqlite, http, or disabled.",
            other
        ),
    }
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    match config.auth.mode.as_str() {
        "disabled" => {}
        "token" => {
            if config.auth.tokens.is_empty() {
                anyhow::bail!("auth.tokens must not be empty when mode is 'token'");
            }
            for entry in &config.auth.tokens {
                if entry.token_sha256.len() != 64
                    || !entry.token_sha256.chars().all(|c| c.is_ascii_hexdigit())
                {
                    anyhow::bail!(
                        "auth.tokens entry for '{}' must carry a 64-char hex SHA-256 digest",
                        entry.user_id
                    );
                }
            }
        }
        other => anyhow::bail!("Unknown auth mode: '{}'. Must be disabled or token.", other),
    }

    Ok(())
}
