//! Engine configuration.

use std::time::Duration;

use crate::retry::RetryOptions;

/// Tunables for a [`crate::ValidationEngine`] instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backoff policy applied around each check execution.
    pub retry: RetryOptions,
    /// Timeout applied to HTTP checks. Expiry surfaces as a normal
    /// transient check failure, not an engine error.
    pub http_timeout: Duration,
    /// Shell used for command checks.
    pub shell: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            http_timeout: Duration::from_secs(env_u64("VALIDATOR_HTTP_TIMEOUT_SECS", 15)),
            shell: std::env::var("VALIDATOR_SHELL").unwrap_or_else(|_| "sh".to_string()),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
