//! Trial tracking and tuning run management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use tg_types::ParamSet;

/// Unique tuning run identifier.
pub type TuneId = Uuid;

/// Metric name to value.
pub type Metrics = BTreeMap<String, f64>;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    /// True if `candidate` is strictly better than `incumbent`.
    pub fn improves(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }
}

/// Top-level configuration for a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneConfig {
    pub id: TuneId,
    pub name: String,

    /// Metric used to rank candidates (e.g. "accuracy", "roc_auc").
    pub metric: String,

    pub direction: ObjectiveDirection,

    /// Number of levels per continuous dimension when building a regular grid.
    pub grid_levels: usize,

    pub created_at: DateTime<Utc>,
}

impl TuneConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            metric: "accuracy".to_string(),
            direction: ObjectiveDirection::Maximize,
            grid_levels: 3,
            created_at: Utc::now(),
        }
    }

    pub fn with_objective(mut self, metric: &str, direction: ObjectiveDirection) -> Self {
        self.metric = metric.to_string();
        self.direction = direction;
        self
    }

    pub fn with_grid_levels(mut self, levels: usize) -> Self {
        self.grid_levels = levels;
        self
    }
}

/// Lifecycle state for a tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuneState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneStatus {
    pub id: TuneId,
    pub config: TuneConfig,
    pub state: TuneState,
    pub trials_completed: usize,
    pub trials_failed: usize,
    pub best_candidate: Option<CandidateSummary>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TuneStatus {
    pub fn new(config: TuneConfig) -> Self {
        Self {
            id: config.id,
            config,
            state: TuneState::Pending,
            trials_completed: 0,
            trials_failed: 0,
            best_candidate: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = TuneState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = TuneState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = TuneState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Count a finished trial.
    pub fn record(&mut self, trial: &Trial) {
        match trial.status {
            TrialStatus::Completed => self.trials_completed += 1,
            TrialStatus::Failed => self.trials_failed += 1,
            TrialStatus::Pending | TrialStatus::Running => {}
        }
    }

    /// Update the best candidate if `summary` improves on the current best.
    ///
    /// Summaries without the configured metric (or with a NaN value) are ignored.
    pub fn update_best(&mut self, summary: &CandidateSummary) {
        let Some(value) = summary.metric(&self.config.metric).filter(|v| !v.is_nan()) else {
            return;
        };
        let dominated = match &self.best_candidate {
            None => true,
            Some(current) => match current.metric(&self.config.metric) {
                Some(best) => self.config.direction.improves(value, best),
                None => true,
            },
        };
        if dominated {
            self.best_candidate = Some(summary.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Individual trial
// ---------------------------------------------------------------------------

/// One candidate evaluated on one resample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub candidate: usize,
    pub resample: usize,
    pub parameters: ParamSet,
    pub status: TrialStatus,
    pub metrics: Metrics,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub error: Option<String>,
}

impl Trial {
    pub fn new(candidate: usize, resample: usize, parameters: ParamSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate,
            resample,
            parameters,
            status: TrialStatus::Pending,
            metrics: Metrics::new(),
            started_at: None,
            finished_at: None,
            worker_id: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self, worker_id: Option<String>) {
        self.status = TrialStatus::Running;
        self.started_at = Some(Utc::now());
        self.worker_id = worker_id;
    }

    pub fn mark_completed(&mut self, metrics: Metrics) {
        self.status = TrialStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.metrics = metrics;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = TrialStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TrialStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Resample-averaged performance of one grid candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub candidate: usize,
    pub parameters: ParamSet,
    /// Mean of each metric over the successful resamples.
    pub mean: Metrics,
    /// Standard error of each mean; absent when fewer than two resamples reported it.
    pub std_err: Metrics,
    /// Number of resamples that reported each metric.
    pub n: BTreeMap<String, usize>,
    /// Error messages from failed resamples.
    pub notes: Vec<String>,
}

impl CandidateSummary {
    /// Summarize the trials of a single candidate.
    pub fn from_trials(candidate: usize, parameters: ParamSet, trials: &[&Trial]) -> Self {
        let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut notes = Vec::new();

        for trial in trials {
            match trial.status {
                TrialStatus::Completed => {
                    for (name, value) in &trial.metrics {
                        values.entry(name.clone()).or_default().push(*value);
                    }
                }
                TrialStatus::Failed => {
                    if let Some(error) = &trial.error {
                        notes.push(format!("resample {}: {error}", trial.resample));
                    }
                }
                TrialStatus::Pending | TrialStatus::Running => {}
            }
        }

        let mut mean = Metrics::new();
        let mut std_err = Metrics::new();
        let mut n = BTreeMap::new();
        for (name, vals) in values {
            let count = vals.len();
            let m = vals.iter().sum::<f64>() / count as f64;
            if count > 1 {
                let var = vals.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (count - 1) as f64;
                std_err.insert(name.clone(), (var / count as f64).sqrt());
            }
            mean.insert(name.clone(), m);
            n.insert(name, count);
        }

        Self {
            candidate,
            parameters,
            mean,
            std_err,
            n,
            notes,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.mean.get(name).copied()
    }
}
