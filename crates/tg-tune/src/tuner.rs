//! Grid tuning loop.
//!
//! [`GridTuner::tune_grid`] validates the grid against the workflow, asks the
//! gate for a dispatch handle once, evaluates every (candidate, resample) pair
//! through it and summarizes the results per candidate. A failed evaluation is
//! logged and kept as a note on its candidate; the run only fails if nothing
//! succeeded.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use tg_parallel::{select_dispatch, DispatchHandle, IterationStrategy, ParallelBackend};
use tg_types::{
    describe_params, validation_error, DependencyLister, EvaluationError, ParamSet, TgResult,
    Workflow,
};

use crate::control::{ControlGrid, ParallelOver};
use crate::trial::{CandidateSummary, Metrics, ObjectiveDirection, Trial, TuneConfig, TuneStatus};

/// Fits a finalized workflow on one resample and reports its metrics.
///
/// Implemented by the modeling framework adapter; the tuner never fits models
/// itself.
pub trait Evaluator: Send + Sync {
    type Resample: Sync;

    fn evaluate(
        &self,
        workflow: &Workflow,
        resample: &Self::Resample,
    ) -> Result<Metrics, EvaluationError>;
}

/// Output of a grid search.
#[derive(Debug, Clone, Serialize)]
pub struct TuneResults {
    pub status: TuneStatus,
    /// Whether iterations were dispatched in parallel.
    pub parallel: bool,
    /// Packages workers were asked to attach.
    pub worker_pkgs: Vec<String>,
    /// Every trial, ordered by candidate then resample.
    pub trials: Vec<Trial>,
    /// One summary per candidate, in grid order.
    pub summaries: Vec<CandidateSummary>,
    pub workflow: Option<Workflow>,
}

impl TuneResults {
    /// The `n` best candidates for `metric` in the given direction.
    ///
    /// Candidates that did not report `metric`, or whose mean is NaN, are
    /// skipped.
    pub fn show_best_by(
        &self,
        metric: &str,
        direction: ObjectiveDirection,
        n: usize,
    ) -> TgResult<Vec<&CandidateSummary>> {
        let mut ranked: Vec<(&CandidateSummary, f64)> = self
            .summaries
            .iter()
            .filter_map(|s| s.metric(metric).map(|v| (s, v)))
            .filter(|(_, v)| !v.is_nan())
            .collect();

        if ranked.is_empty() {
            return Err(validation_error!("no candidate reported metric '{metric}'"));
        }

        ranked.sort_by(|a, b| {
            let ord = a.1.total_cmp(&b.1);
            match direction {
                ObjectiveDirection::Maximize => ord.reverse(),
                ObjectiveDirection::Minimize => ord,
            }
        });

        Ok(ranked.into_iter().take(n).map(|(s, _)| s).collect())
    }

    /// The `n` best candidates for the run's configured metric.
    pub fn show_best(&self, n: usize) -> TgResult<Vec<&CandidateSummary>> {
        let config = &self.status.config;
        self.show_best_by(&config.metric, config.direction, n)
    }

    /// The single best candidate for the run's configured metric.
    pub fn select_best(&self) -> TgResult<&CandidateSummary> {
        self.show_best(1)?
            .into_iter()
            .next()
            .ok_or_else(|| validation_error!("no candidates to select from"))
    }
}

/// Runs grid searches against a parallel backend.
#[derive(Debug)]
pub struct GridTuner<'a> {
    backend: &'a ParallelBackend,
    control: ControlGrid,
    config: TuneConfig,
}

impl<'a> GridTuner<'a> {
    pub fn new(backend: &'a ParallelBackend, config: TuneConfig) -> Self {
        Self {
            backend,
            control: ControlGrid::default(),
            config,
        }
    }

    pub fn with_control(mut self, control: ControlGrid) -> Self {
        self.control = control;
        self
    }

    pub fn config(&self) -> &TuneConfig {
        &self.config
    }

    /// Evaluate every grid candidate on every resample.
    pub fn tune_grid<E>(
        &self,
        workflow: &Workflow,
        resamples: &[E::Resample],
        grid: &[ParamSet],
        evaluator: &E,
    ) -> TgResult<TuneResults>
    where
        E: Evaluator,
    {
        self.control.validate()?;
        let candidates = Self::finalize_candidates(workflow, grid)?;
        if resamples.is_empty() {
            return Err(validation_error!("at least one resample is required"));
        }

        let mut status = TuneStatus::new(self.config.clone());
        let handle = select_dispatch(self.control.allow_par, self.backend, workflow);
        info!(
            "Tuning {} over {} candidates x {} resamples ({} dispatch, {} workers)",
            self.config.name,
            candidates.len(),
            resamples.len(),
            handle.name(),
            handle.workers()
        );
        status.mark_running();

        let mut trials = self.run_trials(&handle, grid, &candidates, resamples, evaluator);
        trials.sort_by_key(|t| (t.candidate, t.resample));
        for trial in &trials {
            status.record(trial);
        }

        if status.trials_completed == 0 {
            let err = EvaluationError::AllFailed {
                attempted: trials.len(),
            };
            status.mark_failed(err.to_string());
            warn!("Tuning {} failed: {}", self.config.name, err);
            return Err(err.into());
        }

        let summaries: Vec<CandidateSummary> = grid
            .iter()
            .enumerate()
            .map(|(idx, params)| {
                let own: Vec<&Trial> = trials.iter().filter(|t| t.candidate == idx).collect();
                CandidateSummary::from_trials(idx, params.clone(), &own)
            })
            .collect();

        for summary in &summaries {
            status.update_best(summary);
        }
        match &status.best_candidate {
            Some(best) => info!(
                "Best {} = {:.4} at {}",
                self.config.metric,
                best.metric(&self.config.metric).unwrap_or(f64::NAN),
                describe_params(&best.parameters)
            ),
            None => warn!("No candidate reported metric {}", self.config.metric),
        }
        status.mark_completed();

        Ok(TuneResults {
            status,
            parallel: handle.is_parallel(),
            worker_pkgs: self.worker_pkgs(workflow),
            trials,
            summaries,
            workflow: self.control.save_workflow.then(|| workflow.clone()),
        })
    }

    /// Check grid columns against the tunable arguments and substitute each
    /// candidate into the workflow.
    fn finalize_candidates(workflow: &Workflow, grid: &[ParamSet]) -> TgResult<Vec<Workflow>> {
        if grid.is_empty() {
            return Err(validation_error!("the grid has no candidates"));
        }

        let tunable: BTreeSet<String> = workflow.tunable_parameters().into_iter().collect();
        for (idx, params) in grid.iter().enumerate() {
            let names: BTreeSet<String> = params.keys().cloned().collect();
            if names != tunable {
                return Err(validation_error!(
                    "grid candidate {idx} has parameters {:?}, workflow tunes {:?}",
                    names,
                    tunable
                ));
            }
        }

        grid.iter().map(|params| workflow.finalize(params)).collect()
    }

    fn run_trials<E>(
        &self,
        handle: &DispatchHandle,
        grid: &[ParamSet],
        candidates: &[Workflow],
        resamples: &[E::Resample],
        evaluator: &E,
    ) -> Vec<Trial>
    where
        E: Evaluator,
    {
        let verbose = self.control.verbose;
        let run_one = |candidate: usize, resample: usize| -> Trial {
            let mut trial = Trial::new(candidate, resample, grid[candidate].clone());
            trial.mark_running(std::thread::current().name().map(str::to_string));

            match evaluator.evaluate(&candidates[candidate], &resamples[resample]) {
                Ok(metrics) => {
                    if verbose {
                        info!("Candidate {} resample {} done", candidate, resample);
                    } else {
                        debug!("Candidate {} resample {} done", candidate, resample);
                    }
                    trial.mark_completed(metrics);
                }
                Err(e) => {
                    warn!(candidate, resample, error = %e, "evaluation failed");
                    trial.mark_failed(e.to_string());
                }
            }
            trial
        };

        match self.control.parallel_over {
            ParallelOver::Resamples => handle
                .map_iter((0..resamples.len()).collect::<Vec<usize>>(), |resample| {
                    (0..candidates.len())
                        .map(|candidate| run_one(candidate, resample))
                        .collect::<Vec<_>>()
                })
                .into_iter()
                .flatten()
                .collect(),
            ParallelOver::Everything => {
                let pairs: Vec<(usize, usize)> = (0..candidates.len())
                    .flat_map(|c| (0..resamples.len()).map(move |r| (c, r)))
                    .collect();
                handle.map_iter(pairs, |(candidate, resample)| run_one(candidate, resample))
            }
        }
    }

    /// Workflow packages followed by the control's extras, deduplicated.
    fn worker_pkgs(&self, workflow: &Workflow) -> Vec<String> {
        let mut pkgs = workflow.required_pkgs().unwrap_or_default();
        for pkg in &self.control.extra_pkgs {
            if !pkgs.contains(pkg) {
                pkgs.push(pkg.clone());
            }
        }
        pkgs
    }
}
