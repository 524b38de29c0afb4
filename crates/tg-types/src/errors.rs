use thiserror::Error;

/// Main error type for TuneGate
#[derive(Error, Debug)]
pub enum TgError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while assessing a single candidate on a single resample
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Model fit failed for candidate {candidate} on resample {resample}: {message}")]
    FitFailed {
        candidate: usize,
        resample: usize,
        message: String,
    },

    #[error("Metric {metric} could not be computed: {message}")]
    MetricFailed { metric: String, message: String },

    #[error("All {attempted} evaluations failed")]
    AllFailed { attempted: usize },
}

/// Result type alias for TuneGate operations
pub type TgResult<T> = Result<T, TgError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::TgError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TgError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TgError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EvaluationError::FitFailed {
            candidate: 3,
            resample: 1,
            message: "singular matrix".to_string(),
        };

        assert!(error.to_string().contains("candidate 3"));
        assert!(error.to_string().contains("resample 1"));
        assert!(error.to_string().contains("singular matrix"));
    }

    #[test]
    fn test_error_conversion() {
        let eval_error = EvaluationError::AllFailed { attempted: 10 };
        let tg_error: TgError = eval_error.into();

        match tg_error {
            TgError::Evaluation(EvaluationError::AllFailed { attempted }) => {
                assert_eq!(attempted, 10)
            }
            _ => panic!("Expected Evaluation error"),
        }
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert_eq!(validation_err.to_string(), "Validation error: Invalid value: 42");

        let internal_err = internal_error!("pool vanished: {}", 3);
        assert!(matches!(internal_err, TgError::Internal(ref m) if m == "pool vanished: 3"));
        let config_err = config_error!("Missing required field: {}", "metric");
        assert!(matches!(config_err, TgError::Config(_)));
    }
}
