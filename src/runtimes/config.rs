//! Tuning knobs for an [`super::Engine`] (SPEC_FULL.md §6 "Tuning knobs"),
//! adapted from the teacher's `RuntimeConfig`/`resolve_sqlite_db_name`
//! pattern: sensible defaults, overridable via `dotenvy`-loaded
//! environment variables.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub sweep_interval: Duration,
    pub worker_pool_size: usize,
    pub default_attempt_timeout: Duration,
    pub max_attempts_per_node: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Connection string for the `sqlite`/`postgres` gateways. Ignored
    /// by the in-memory gateway.
    pub store_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            worker_pool_size: Self::default_worker_pool_size(),
            default_attempt_timeout: Duration::from_secs(30),
            max_attempts_per_node: 5,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
            store_url: Self::resolve_store_url(None),
        }
    }
}

impl EngineConfig {
    fn default_worker_pool_size() -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
    }

    fn resolve_store_url(provided: Option<String>) -> Option<String> {
        if provided.is_some() {
            return provided;
        }
        dotenvy::dotenv().ok();
        std::env::var("LOOMGRAPH_STORE_URL").ok()
    }

    #[must_use]
    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = Self::resolve_store_url(Some(url.into()));
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_default_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.default_attempt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_attempts_per_node(mut self, max_attempts: u32) -> Self {
        self.max_attempts_per_node = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }
}
