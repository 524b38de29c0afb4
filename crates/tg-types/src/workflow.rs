//! Workflow specification: a model plus the preprocessing that feeds it.
//!
//! A [`Workflow`] is the unit of tuning. Its internals are owned by whichever
//! modeling framework adapter builds it; the tuning layer only reads the
//! package dependencies (via [`DependencyLister`]) and the tunable arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::{TgError, TgResult};
use crate::params::{ParamSet, ParameterValue};

/// Retrieve the software packages a model configuration depends on.
///
/// Returning `None` means the dependency list could not be derived.
pub trait DependencyLister {
    fn required_pkgs(&self) -> Option<Vec<String>>;
}

/// What kind of prediction the model makes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelMode {
    Classification,
    Regression,
    #[default]
    Unknown,
}

/// A model argument: either fixed or marked for tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuneArg {
    Fixed(ParameterValue),
    Tune,
}

/// Model specification: engine, mode, arguments and the packages the engine needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model type (e.g. "nearest_neighbor").
    pub model_type: String,
    /// Computational engine (e.g. "kknn").
    pub engine: String,
    pub mode: ModelMode,
    pub args: BTreeMap<String, TuneArg>,
    /// Packages the engine loads to fit and predict.
    pub packages: Vec<String>,
}

impl ModelSpec {
    pub fn new(model_type: impl Into<String>, engine: impl Into<String>) -> Self {
        let engine = engine.into();
        Self {
            model_type: model_type.into(),
            packages: vec![engine.clone()],
            engine,
            mode: ModelMode::default(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: ModelMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.args.insert(name.into(), TuneArg::Fixed(value));
        self
    }

    pub fn with_tune(mut self, name: impl Into<String>) -> Self {
        self.args.insert(name.into(), TuneArg::Tune);
        self
    }

    /// Replace the engine package list (the engine name is the default).
    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages = packages.into_iter().map(Into::into).collect();
        self
    }
}

/// A single preprocessing step and the packages it requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessStep {
    pub name: String,
    pub packages: Vec<String>,
}

/// Ordered preprocessing steps applied before the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub steps: Vec<PreprocessStep>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step<I, S>(mut self, name: impl Into<String>, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.push(PreprocessStep {
            name: name.into(),
            packages: packages.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// A model bundled with its preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub model: ModelSpec,
    pub preprocessor: Preprocessor,
}

impl Workflow {
    pub fn new(name: impl Into<String>, model: ModelSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            model,
            preprocessor: Preprocessor::default(),
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Names of the model arguments marked for tuning, in name order.
    pub fn tunable_parameters(&self) -> Vec<String> {
        self.model
            .args
            .iter()
            .filter(|(_, arg)| matches!(arg, TuneArg::Tune))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Substitute concrete values for every tune placeholder.
    ///
    /// Fails if a placeholder has no value in `params` or `params` names an
    /// argument the model does not have.
    pub fn finalize(&self, params: &ParamSet) -> TgResult<Workflow> {
        if let Some(unknown) = params.keys().find(|k| !self.model.args.contains_key(*k)) {
            return Err(TgError::Validation(format!(
                "parameter '{unknown}' is not an argument of {}",
                self.model.model_type
            )));
        }

        let mut finalized = self.clone();
        for (name, arg) in finalized.model.args.iter_mut() {
            if let TuneArg::Tune = arg {
                let value = params.get(name).ok_or_else(|| {
                    TgError::Validation(format!("no value supplied for tunable parameter '{name}'"))
                })?;
                *arg = TuneArg::Fixed(value.clone());
            }
        }
        Ok(finalized)
    }
}

impl DependencyLister for Workflow {
    /// Model packages first, then preprocessor packages; duplicates dropped.
    fn required_pkgs(&self) -> Option<Vec<String>> {
        let mut pkgs: Vec<String> = Vec::new();
        let all = self
            .model
            .packages
            .iter()
            .chain(self.preprocessor.steps.iter().flat_map(|s| s.packages.iter()));
        for pkg in all {
            if !pkgs.contains(pkg) {
                pkgs.push(pkg.clone());
            }
        }
        Some(pkgs)
    }
}
