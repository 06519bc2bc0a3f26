use serde::{Deserialize, Serialize};

use crate::grammar::TagSet;
use crate::logging::LoggingConfig;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_payload_size: usize,
    /// Upstream chat-completion endpoint
    pub upstream: UpstreamConfig,
    /// Caller input bounds
    pub limits: LimitsConfig,
    /// Fixed-window rate limit applied to the analysis endpoints
    pub rate_limit: RateLimitConfig,
    /// Tag names the model is prompted with
    #[serde(default)]
    pub tags: TagSet,
    /// Log directory (None = stdout only)
    pub log_dir: Option<String>,
    /// Log level (None = info)
    pub log_level: Option<String>,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_payload_size: 10 * 1024 * 1024,
            upstream: UpstreamConfig::default(),
            limits: LimitsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            tags: TagSet::default(),
            log_dir: None,
            log_level: None,
            log_json: false,
        }
    }
}

impl ServerConfig {
    pub fn logging_config(&self) -> LoggingConfig {
        let level = self
            .log_level
            .as_deref()
            .and_then(|level| level.parse().ok())
            .unwrap_or(tracing::Level::INFO);
        LoggingConfig {
            level,
            json_format: self.log_json,
            log_dir: self.log_dir.clone(),
            ..Default::default()
        }
    }
}

/// OpenAI-compatible chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Bearer token sent to the upstream
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Completion token cap
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Replaces the built-in system prompt
    pub system_prompt: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.ai.sakura.ad.jp/v1".to_string(),
            api_key: None,
            model: "preview/Qwen3-VL-30B-A3B-Instruct".to_string(),
            max_tokens: 1024,
            request_timeout_secs: 600,
            system_prompt: None,
        }
    }
}

/// Caller input bounds, checked before any upstream stream opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum text length in characters
    pub max_text_chars: usize,
    /// Maximum encoded image size in bytes
    pub max_image_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 1000,
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds
    pub window_secs: u64,
    /// Requests allowed per caller per window
    pub max_requests: u32,
    /// Message returned with 429 responses
    pub message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 30,
            message: "Too many requests, please try again later.".to_string(),
        }
    }
}
