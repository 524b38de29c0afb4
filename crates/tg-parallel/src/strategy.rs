//! Sequential and parallel iteration over resampling work.

use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;

/// Apply a body to every item of a collection, returning results in input order.
///
/// Implementations differ only in where the body runs; callers invoke them
/// identically.
pub trait IterationStrategy {
    fn map_iter<T, R, F>(&self, items: Vec<T>, body: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync;

    fn is_parallel(&self) -> bool;

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Runs every iteration on the calling thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sequential;

impl IterationStrategy for Sequential {
    fn map_iter<T, R, F>(&self, items: Vec<T>, body: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        items.into_iter().map(body).collect()
    }

    fn is_parallel(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "sequential"
    }
}

/// Runs iterations on a registered worker pool.
#[derive(Debug, Clone)]
pub struct Parallel {
    pool: Arc<ThreadPool>,
}

impl Parallel {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl IterationStrategy for Parallel {
    fn map_iter<T, R, F>(&self, items: Vec<T>, body: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        self.pool.install(|| items.into_par_iter().map(body).collect())
    }

    fn is_parallel(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "parallel"
    }
}

/// The strategy selected by the gate.
#[derive(Debug, Clone)]
pub enum DispatchHandle {
    Sequential(Sequential),
    Parallel(Parallel),
}

impl DispatchHandle {
    /// Number of workers iterations will be spread over.
    pub fn workers(&self) -> usize {
        match self {
            Self::Sequential(_) => 1,
            Self::Parallel(p) => p.workers(),
        }
    }
}

impl Default for DispatchHandle {
    fn default() -> Self {
        Self::Sequential(Sequential)
    }
}

impl IterationStrategy for DispatchHandle {
    fn map_iter<T, R, F>(&self, items: Vec<T>, body: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        match self {
            Self::Sequential(s) => s.map_iter(items, body),
            Self::Parallel(p) => p.map_iter(items, body),
        }
    }

    fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel(_))
    }

    fn name(&self) -> &str {
        match self {
            Self::Sequential(s) => s.name(),
            Self::Parallel(p) => p.name(),
        }
    }
}
