//! # tg-parallel
//!
//! Parallel backend registration and the parallel-execution gate.
//!
//! The gate decides, once per tuning run, whether resampling iterations are
//! dispatched across the registered worker pool or run sequentially. Packages
//! known to misbehave on parallel workers force sequential dispatch.

mod backend;
mod gate;
mod strategy;

pub use backend::{BackendConfig, ParallelBackend, WORKERS_ENV_VAR};
pub use gate::{
    blacklisted_in, decide, select_dispatch, GateDecision, PARALLEL_BLACKLIST,
    PROHIBIT_PARALLEL_MSG,
};
pub use strategy::{DispatchHandle, IterationStrategy, Parallel, Sequential};
