use crate::error::{GatewayError, Result};
use crate::rate_limit::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SiteConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-endpoint rate limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// AI chat proxy configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// Prometheus metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Rate limits for the API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_chat_limit")]
    pub ai_chat: RateLimitConfig,
    #[serde(default = "default_svg_limit")]
    pub svg_optimize: RateLimitConfig,
    #[serde(default = "default_placeholder_limit")]
    pub placeholder: RateLimitConfig,
    /// Seconds between limiter cleanup passes (0 disables the task)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

/// AI chat proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_chat_upstream")]
    pub upstream_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Prepended to every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Most recent messages kept from the client conversation
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Characters kept per message
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Key looked up in the secrets provider for the upstream bearer token
    #[serde(default = "default_api_key_secret")]
    pub api_key_secret: String,
}

/// Prometheus metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timeout() -> u64 {
    30
}

fn default_chat_limit() -> RateLimitConfig {
    RateLimitConfig::new(60_000, 10)
}

fn default_svg_limit() -> RateLimitConfig {
    RateLimitConfig::new(60_000, 20)
}

fn default_placeholder_limit() -> RateLimitConfig {
    RateLimitConfig::new(60_000, 60)
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_chat_upstream() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant on a personal portfolio website. Answer questions about \
     the site owner's work, projects and experience concisely."
        .to_string()
}

fn default_max_messages() -> usize {
    20
}

fn default_max_message_chars() -> usize {
    2000
}

fn default_max_tokens() -> u32 {
    500
}

fn default_api_key_secret() -> String {
    "chat_api_key".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            ai_chat: default_chat_limit(),
            svg_optimize: default_svg_limit(),
            placeholder: default_placeholder_limit(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            upstream_url: default_chat_upstream(),
            model: default_chat_model(),
            system_prompt: default_system_prompt(),
            max_messages: default_max_messages(),
            max_message_chars: default_max_message_chars(),
            max_tokens: default_max_tokens(),
            api_key_secret: default_api_key_secret(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl SiteConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(GatewayError::Config("Server host cannot be empty".to_string()));
        }

        if self.server.timeout_secs == 0 {
            return Err(GatewayError::Config(
                "Server timeout_secs must be > 0".to_string(),
            ));
        }

        for (name, limit) in [
            ("ai_chat", &self.limits.ai_chat),
            ("svg_optimize", &self.limits.svg_optimize),
            ("placeholder", &self.limits.placeholder),
        ] {
            limit.validate().map_err(|e| {
                GatewayError::InvalidConfiguration(format!("limits.{}: {}", name, e))
            })?;
        }

        let upstream = &self.chat.upstream_url;
        if !upstream.starts_with("http://") && !upstream.starts_with("https://") {
            return Err(GatewayError::Config(format!(
                "Chat upstream URL must start with http:// or https://: {}",
                upstream
            )));
        }

        if self.chat.max_messages == 0 || self.chat.max_message_chars == 0 {
            return Err(GatewayError::Config(
                "Chat max_messages and max_message_chars must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
