//! Worker pool registration.

use parking_lot::RwLock;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use tg_types::{config_error, TgResult};

/// Environment variable overriding the number of workers to register.
pub const WORKERS_ENV_VAR: &str = "TUNEGATE_WORKERS";

/// Settings for registering a worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Number of worker threads to start.
    pub workers: usize,
    /// Thread names are `{prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            thread_name_prefix: "tunegate-worker".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Defaults, with `workers` taken from `TUNEGATE_WORKERS` when set.
    pub fn from_env() -> TgResult<Self> {
        let config = Self::default();
        match std::env::var(WORKERS_ENV_VAR) {
            Ok(raw) => Self::parse_workers(&raw).map(|n| config.with_workers(n)),
            Err(_) => Ok(config),
        }
    }

    fn parse_workers(raw: &str) -> TgResult<usize> {
        raw.trim().parse::<usize>().map_err(|e| {
            config_error!("{WORKERS_ENV_VAR} must be a non-negative integer, got '{raw}': {e}")
        })
    }
}

/// Registry for the worker pool used by parallel dispatch.
///
/// With no pool registered the backend reports a single worker, which the
/// gate treats as "parallelism unavailable".
#[derive(Debug, Default)]
pub struct ParallelBackend {
    pool: RwLock<Option<Arc<ThreadPool>>>,
}

impl ParallelBackend {
    /// A backend with nothing registered.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Build a backend and register a pool in one step.
    pub fn with_config(config: &BackendConfig) -> TgResult<Self> {
        let backend = Self::sequential();
        backend.register(config)?;
        Ok(backend)
    }

    /// Start a pool and make it the registered one, replacing any previous pool.
    ///
    /// Returns the number of registered workers.
    pub fn register(&self, config: &BackendConfig) -> TgResult<usize> {
        if config.workers == 0 {
            return Err(config_error!("cannot register a pool with zero workers"));
        }

        let prefix = config.thread_name_prefix.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| config_error!("failed to create worker pool: {e}"))?;

        let workers = pool.current_num_threads();
        *self.pool.write() = Some(Arc::new(pool));
        info!("Registered parallel backend with {} workers", workers);
        Ok(workers)
    }

    /// Drop the registered pool; subsequent dispatch is sequential.
    pub fn stop(&self) {
        if self.pool.write().take().is_some() {
            info!("Parallel backend stopped");
        }
    }

    /// The registered pool, if any.
    pub fn pool(&self) -> Option<Arc<ThreadPool>> {
        self.pool.read().clone()
    }

    /// Number of registered workers; 1 when no pool is registered.
    pub fn worker_count(&self) -> usize {
        self.pool
            .read()
            .as_ref()
            .map_or(1, |pool| pool.current_num_threads())
    }
}
