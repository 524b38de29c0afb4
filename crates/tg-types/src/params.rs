//! Concrete hyperparameter values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A concrete parameter value, either produced by a grid or fixed on a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Json(v) => v.as_f64(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(_) => None,
            Self::Json(v) => v.as_i64(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Json(v) => v.as_str(),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// One candidate: parameter name to value, ordered by name.
pub type ParamSet = BTreeMap<String, ParameterValue>;

/// Render a candidate as `name=value` pairs, used in log lines.
pub fn describe_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_deserialization_prefers_int() {
        let v: ParameterValue = serde_json::from_str("7").unwrap();
        assert_eq!(v, ParameterValue::Int(7));

        let v: ParameterValue = serde_json::from_str("0.25").unwrap();
        assert_eq!(v, ParameterValue::Float(0.25));

        let v: ParameterValue = serde_json::from_str("\"rectangular\"").unwrap();
        assert_eq!(v.as_str(), Some("rectangular"));
    }

    #[test]
    fn numeric_accessors() {
        assert_eq!(ParameterValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ParameterValue::Float(1.5).as_i64(), None);
        assert_eq!(ParameterValue::Json(serde_json::json!(4)).as_i64(), Some(4));
    }

    #[test]
    fn describe_is_name_ordered() {
        let mut params = ParamSet::new();
        params.insert("weight_func".into(), ParameterValue::Json(serde_json::json!("triangular")));
        params.insert("neighbors".into(), ParameterValue::Int(5));
        assert_eq!(
            describe_params(&params),
            "neighbors=5, weight_func=\"triangular\""
        );
    }
}
