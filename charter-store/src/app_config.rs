use charter_booking::WorkflowSettings;
use charter_chat::ChatSettings;
use charter_core::RetryPolicy;
use charter_shared::Decimal;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a URL the in-memory store is used.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// Without a URL live events stay in-process.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Shared secret the payment gateway sends in `X-Webhook-Secret`.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub amount_epsilon: Decimal,
    #[serde(default = "default_settlement_timeout")]
    pub settlement_timeout_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_settlement_timeout() -> u64 { 30 }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_backoff() -> u64 { 50 }

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            amount_epsilon: Decimal::ZERO,
            settlement_timeout_seconds: default_settlement_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl WorkflowConfig {
    pub fn settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            amount_epsilon: self.amount_epsilon.abs(),
            settlement_timeout: Duration::from_secs(self.settlement_timeout_seconds),
            retry: RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_backoff_ms),
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_preview_len")]
    pub preview_len: usize,
}

fn default_max_message_len() -> usize { 4000 }
fn default_preview_len() -> usize { 80 }

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_len: default_max_message_len(),
            preview_len: default_preview_len(),
        }
    }
}

impl ChatConfig {
    pub fn settings(&self) -> ChatSettings {
        ChatSettings {
            max_message_len: self.max_message_len,
            preview_len: self.preview_len,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconciliationConfig {
    /// Zero disables the periodic pass; the startup pass always runs.
    #[serde(default = "default_reconcile_interval")]
    pub interval_seconds: u64,
}

fn default_reconcile_interval() -> u64 { 300 }

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_reconcile_interval(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CHARTER__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("CHARTER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
