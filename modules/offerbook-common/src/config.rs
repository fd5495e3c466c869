use std::env;

/// Reconciler tuning, passed explicitly to the orchestrator.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Read-merge-write attempts per offer before reporting a conflict.
    pub max_write_attempts: u32,
    /// Base backoff between attempts; doubles each retry.
    pub retry_backoff_ms: u64,
    /// Upper bound on any single store call.
    pub store_timeout_ms: u64,
    /// Skip offers whose content fingerprint was already folded in.
    pub skip_seen_offers: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_write_attempts: 4,
            retry_backoff_ms: 50,
            store_timeout_ms: 10_000,
            skip_seen_offers: true,
        }
    }
}

impl ReconcilerConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_write_attempts: env_u64("OFFERBOOK_MAX_WRITE_ATTEMPTS", d.max_write_attempts as u64)
                as u32,
            retry_backoff_ms: env_u64("OFFERBOOK_RETRY_BACKOFF_MS", d.retry_backoff_ms),
            store_timeout_ms: env_u64("OFFERBOOK_STORE_TIMEOUT_MS", d.store_timeout_ms),
            skip_seen_offers: env::var("OFFERBOOK_SKIP_SEEN_OFFERS")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(d.skip_seen_offers),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
