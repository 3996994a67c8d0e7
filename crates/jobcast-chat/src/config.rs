use std::time::Duration;

use jobcast_events::DEFAULT_QUEUE_CAPACITY;

use crate::buffer_utils::{
    FlushPolicy, FlushThresholds, FIRST_BATCH_MAX_FRAGMENTS, FIRST_BATCH_MAX_INTERVAL,
    STEADY_MAX_FRAGMENTS, STEADY_MAX_INTERVAL,
};

/// Default upstream proxy when none is configured (a locally running
/// LiteLLM-style proxy)
pub const DEFAULT_PROXY_BASE_URL: &str = "http://localhost:4000";

/// Environment override for the proxy base URL
pub const PROXY_URL_ENV: &str = "JOBCAST_PROXY_URL";
/// Environment override for the bearer token (local runs)
pub const AUTH_TOKEN_ENV: &str = "JOBCAST_AUTH_TOKEN";

/// Everything a chat session needs decided up front
///
/// Passed explicitly into the session driver at construction; nothing is
/// read from the environment at stream time.
#[derive(Debug, Clone)]
pub struct ChatRelayConfig {
    /// Base URL of the upstream chat-completion proxy
    pub proxy_base_url: String,
    /// Explicit bearer token; takes precedence over job authorization
    pub auth_token: Option<String>,

    pub first_batch_max_fragments: usize,
    pub first_batch_max_interval: Duration,
    pub steady_max_fragments: usize,
    pub steady_max_interval: Duration,

    /// Bound on how long `drain` waits for any one outstanding sink write
    pub per_write_drain_timeout: Duration,
    /// TCP connect timeout toward the proxy
    pub connect_timeout: Duration,
    /// Bound on how long the stream loop waits for the next upstream bytes
    pub read_timeout: Duration,
    /// Dispatch queue bound; submission only waits on capacity
    pub queue_capacity: usize,
}

impl Default for ChatRelayConfig {
    fn default() -> Self {
        Self {
            proxy_base_url: DEFAULT_PROXY_BASE_URL.to_string(),
            auth_token: None,
            first_batch_max_fragments: FIRST_BATCH_MAX_FRAGMENTS,
            first_batch_max_interval: FIRST_BATCH_MAX_INTERVAL,
            steady_max_fragments: STEADY_MAX_FRAGMENTS,
            steady_max_interval: STEADY_MAX_INTERVAL,
            per_write_drain_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(300),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ChatRelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden from `JOBCAST_PROXY_URL` / `JOBCAST_AUTH_TOKEN`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(PROXY_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                config.proxy_base_url = url.to_string();
            }
        }
        if let Ok(token) = std::env::var(AUTH_TOKEN_ENV) {
            let token = token.trim();
            if !token.is_empty() {
                config.auth_token = Some(token.to_string());
            }
        }
        config
    }

    pub fn proxy_base_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_base_url = url.into();
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn first_batch_thresholds(mut self, max_fragments: usize, max_interval: Duration) -> Self {
        self.first_batch_max_fragments = max_fragments;
        self.first_batch_max_interval = max_interval;
        self
    }

    pub fn steady_thresholds(mut self, max_fragments: usize, max_interval: Duration) -> Self {
        self.steady_max_fragments = max_fragments;
        self.steady_max_interval = max_interval;
        self
    }

    pub fn per_write_drain_timeout(mut self, timeout: Duration) -> Self {
        self.per_write_drain_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Flush policy seeded with this config's two threshold sets
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy::new(
            FlushThresholds {
                max_fragments: self.first_batch_max_fragments,
                max_interval: self.first_batch_max_interval,
            },
            FlushThresholds {
                max_fragments: self.steady_max_fragments,
                max_interval: self.steady_max_interval,
            },
        )
    }
}
