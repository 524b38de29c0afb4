//! Run-time control settings for grid tuning.

use serde::{Deserialize, Serialize};

use tg_types::{config_error, TgResult};

/// Which loop the dispatch handle parallelizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelOver {
    /// One task per resample; candidates are evaluated in turn inside it.
    #[default]
    Resamples,
    /// One task per (candidate, resample) pair.
    Everything,
}

/// Controls how a grid search runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlGrid {
    /// Log every completed trial at info level instead of debug.
    pub verbose: bool,
    /// Permit parallel dispatch when a multi-worker backend is registered.
    pub allow_par: bool,
    pub parallel_over: ParallelOver,
    /// Additional packages workers should attach.
    pub extra_pkgs: Vec<String>,
    /// Keep a copy of the tuned workflow on the results.
    pub save_workflow: bool,
}

impl Default for ControlGrid {
    fn default() -> Self {
        Self {
            verbose: false,
            allow_par: true,
            parallel_over: ParallelOver::Resamples,
            extra_pkgs: Vec::new(),
            save_workflow: false,
        }
    }
}

impl ControlGrid {
    pub fn with_allow_par(mut self, allow: bool) -> Self {
        self.allow_par = allow;
        self
    }

    pub fn with_parallel_over(mut self, over: ParallelOver) -> Self {
        self.parallel_over = over;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_extra_pkgs<I, S>(mut self, pkgs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_pkgs = pkgs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_save_workflow(mut self, save: bool) -> Self {
        self.save_workflow = save;
        self
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> TgResult<Self> {
        let control: Self = serde_json::from_str(json)?;
        control.validate()?;
        Ok(control)
    }

    pub fn validate(&self) -> TgResult<()> {
        if let Some(blank) = self.extra_pkgs.iter().find(|p| p.trim().is_empty()) {
            return Err(config_error!("extra_pkgs contains a blank package name: '{blank}'"));
        }
        Ok(())
    }
}
