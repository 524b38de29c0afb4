//! Search space definitions and regular grid construction.

use serde::{Deserialize, Serialize};

use tg_types::{validation_error, ParamSet, ParameterValue, TgResult};

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name, matching a tunable model argument (e.g. "neighbors").
    pub name: String,
    pub kind: ParameterKind,
}

/// Describes the values a parameter takes on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Continuous range [low, high], split into evenly spaced levels.
    FloatRange { low: f64, high: f64 },
    /// Integer range [low, high] inclusive, every value enumerated.
    IntRange { low: i64, high: i64 },
    /// Range spaced evenly in log-space.
    LogUniform { low: f64, high: f64 },
    /// Categorical choices.
    Choice { values: Vec<serde_json::Value> },
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    pub fn add_choice(mut self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Choice { values },
        });
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Reject dimensions that cannot be laid out as a grid.
    pub fn validate(&self) -> TgResult<()> {
        for param in &self.parameters {
            let name = &param.name;
            match &param.kind {
                ParameterKind::IntRange { low, high } => {
                    if low > high {
                        return Err(validation_error!("{name}: empty range [{low}, {high}]"));
                    }
                    if Self::int_levels(*low, *high).is_none() {
                        return Err(validation_error!("{name}: range [{low}, {high}] is too wide"));
                    }
                }
                ParameterKind::FloatRange { low, high } => {
                    if !low.is_finite() || !high.is_finite() || low > high {
                        return Err(validation_error!("{name}: invalid range [{low}, {high}]"));
                    }
                }
                ParameterKind::LogUniform { low, high } => {
                    if low.is_nan() || *low <= 0.0 || !high.is_finite() || low > high {
                        return Err(validation_error!(
                            "{name}: log range [{low}, {high}] needs 0 < low <= high"
                        ));
                    }
                }
                ParameterKind::Choice { values } => {
                    if values.is_empty() {
                        return Err(validation_error!("{name}: no choices"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of grid points with `levels` steps per continuous dimension.
    ///
    /// Returns `None` on overflow or an inverted integer range.
    pub fn grid_size(&self, levels: usize) -> Option<usize> {
        let mut total: usize = 1;
        for param in &self.parameters {
            let dim_size = match &param.kind {
                ParameterKind::IntRange { low, high } => Self::int_levels(*low, *high)?,
                ParameterKind::Choice { values } => values.len(),
                ParameterKind::FloatRange { .. } | ParameterKind::LogUniform { .. } => {
                    levels.max(2)
                }
            };
            total = total.checked_mul(dim_size)?;
        }
        Some(total)
    }

    fn int_levels(low: i64, high: i64) -> Option<usize> {
        let span = high.checked_sub(low)?.checked_add(1)?;
        usize::try_from(span).ok()
    }
}

/// Exhaustive regular grid over the search space.
#[derive(Debug, Clone)]
pub struct GridSearch {
    combos: Vec<ParamSet>,
}

impl GridSearch {
    /// Build the grid; continuous dimensions get `levels` evenly spaced
    /// values (at least two).
    pub fn new(space: &SearchSpace, levels: usize) -> TgResult<Self> {
        space.validate()?;
        if space.grid_size(levels).is_none() {
            return Err(validation_error!("grid over {:?} is too large", space.names()));
        }
        Ok(Self {
            combos: Self::build_grid(space, levels),
        })
    }

    pub fn candidates(&self) -> &[ParamSet] {
        &self.combos
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    fn axis(kind: &ParameterKind, levels: usize) -> Vec<ParameterValue> {
        let steps = levels.max(2);
        let spaced = |low: f64, high: f64| -> Vec<f64> {
            (0..steps)
                .map(|i| {
                    let t = i as f64 / (steps - 1) as f64;
                    low + t * (high - low)
                })
                .collect()
        };

        match kind {
            ParameterKind::FloatRange { low, high } => spaced(*low, *high)
                .into_iter()
                .map(ParameterValue::Float)
                .collect(),
            ParameterKind::IntRange { low, high } => {
                (*low..=*high).map(ParameterValue::Int).collect()
            }
            ParameterKind::LogUniform { low, high } => spaced(low.ln(), high.ln())
                .into_iter()
                .map(|v| ParameterValue::Float(v.exp()))
                .collect(),
            ParameterKind::Choice { values } => {
                values.iter().cloned().map(ParameterValue::Json).collect()
            }
        }
    }

    fn build_grid(space: &SearchSpace, levels: usize) -> Vec<ParamSet> {
        if space.parameters.is_empty() {
            return Vec::new();
        }

        // Cartesian product; the first parameter varies slowest.
        let mut result: Vec<ParamSet> = vec![ParamSet::new()];
        for param in &space.parameters {
            let axis = Self::axis(&param.kind, levels);
            let mut next = Vec::with_capacity(result.len() * axis.len());
            for existing in &result {
                for value in &axis {
                    let mut combo = existing.clone();
                    combo.insert(param.name.clone(), value.clone());
                    next.push(combo);
                }
            }
            result = next;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_types::TgError;

    #[test]
    fn grid_search_produces_correct_count() {
        let space = SearchSpace::new()
            .add_int("a", 1, 3) // 3 values
            .add_int("b", 10, 11); // 2 values
        assert_eq!(space.grid_size(5), Some(6));

        let gs = GridSearch::new(&space, 5).unwrap();
        assert_eq!(gs.len(), 6);
        assert_eq!(gs.candidates()[5]["a"], ParameterValue::Int(3));
    }

    #[test]
    fn float_levels_include_endpoints() {
        let space = SearchSpace::new().add_float("mixture", 0.0, 1.0);
        assert_eq!(space.grid_size(3), Some(3));

        let gs = GridSearch::new(&space, 3).unwrap();
        let values: Vec<f64> = gs
            .candidates()
            .iter()
            .map(|p| p["mixture"].as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn log_levels_spaced_geometrically() {
        let space = SearchSpace::new().add_log_uniform("penalty", 1e-4, 1.0);
        let gs = GridSearch::new(&space, 5).unwrap();
        let values: Vec<f64> = gs
            .candidates()
            .iter()
            .map(|p| p["penalty"].as_f64().unwrap())
            .collect();
        let expected = [1e-4, 1e-3, 1e-2, 1e-1, 1.0];
        for (got, want) in values.iter().zip(expected) {
            assert!((got / want - 1.0).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn single_level_is_raised_to_two() {
        let space = SearchSpace::new().add_float("x", 2.0, 4.0);
        assert_eq!(GridSearch::new(&space, 1).unwrap().len(), 2);
    }

    #[test]
    fn first_parameter_varies_slowest() {
        let space = SearchSpace::new()
            .add_int("neighbors", 1, 2)
            .add_choice(
                "weight_func",
                vec![
                    serde_json::json!("rectangular"),
                    serde_json::json!("triangular"),
                ],
            );
        let gs = GridSearch::new(&space, 2).unwrap();
        let order: Vec<(i64, String)> = gs
            .candidates()
            .iter()
            .map(|p| {
                (
                    p["neighbors"].as_i64().unwrap(),
                    p["weight_func"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (1, "rectangular".to_string()),
                (1, "triangular".to_string()),
                (2, "rectangular".to_string()),
                (2, "triangular".to_string()),
            ]
        );
    }

    #[test]
    fn empty_space_has_no_candidates() {
        let gs = GridSearch::new(&SearchSpace::new(), 3).unwrap();
        assert!(gs.is_empty());
    }

    #[test]
    fn inverted_int_range_is_rejected() {
        let space = SearchSpace::new().add_int("x", 5, 1);
        assert_eq!(space.grid_size(3), None);
        assert!(matches!(
            GridSearch::new(&space, 3),
            Err(TgError::Validation(_))
        ));
    }

    #[test]
    fn extreme_int_bounds_do_not_overflow() {
        let space = SearchSpace::new().add_int("seed", i64::MIN, i64::MAX);
        assert_eq!(space.grid_size(3), None);
        let err = GridSearch::new(&space, 3).unwrap_err();
        assert!(err.to_string().contains("seed"));
    }

    #[test]
    fn non_positive_log_bound_is_rejected() {
        for low in [0.0, -1.0, f64::NAN] {
            let space = SearchSpace::new().add_log_uniform("penalty", low, 1.0);
            assert!(space.validate().is_err(), "low = {low}");
            assert!(GridSearch::new(&space, 3).is_err());
        }
    }

    #[test]
    fn empty_choice_is_rejected() {
        let space = SearchSpace::new().add_choice("weight_func", vec![]);
        assert!(matches!(space.validate(), Err(TgError::Validation(_))));
    }

    #[test]
    fn search_space_builder_chain() {
        let space = SearchSpace::new()
            .add_int("a", 1, 10)
            .add_float("b", 0.0, 1.0)
            .add_log_uniform("c", 0.001, 100.0)
            .add_choice("d", vec![serde_json::json!(true), serde_json::json!(false)]);
        assert_eq!(space.names(), vec!["a", "b", "c", "d"]);
        assert_eq!(space.grid_size(4), Some(10 * 4 * 4 * 2));
    }
}
