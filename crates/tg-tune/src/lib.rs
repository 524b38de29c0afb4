//! # tg-tune
//!
//! Grid-search hyperparameter tuning for TuneGate.
//!
//! Provides regular grid construction over a parameter space, run
//! configuration, trial tracking, and the [`GridTuner`] loop that evaluates
//! every (candidate, resample) pair through the dispatch handle chosen by the
//! parallel-execution gate. Model fitting and metric computation are supplied
//! by the caller through [`Evaluator`].

mod control;
mod search;
mod trial;
mod tuner;

pub use control::{ControlGrid, ParallelOver};
pub use search::{GridSearch, ParameterDef, ParameterKind, SearchSpace};
pub use trial::{
    CandidateSummary, Metrics, ObjectiveDirection, Trial, TrialStatus, TuneConfig, TuneId,
    TuneState, TuneStatus,
};
pub use tuner::{Evaluator, GridTuner, TuneResults};
