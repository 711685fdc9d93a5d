use thiserror::Error;

/// Error taxonomy of the leveling core.
///
/// Component-local validation failures abort the pipeline immediately.
/// Statistical anomalies (chi-square rejection, blunder flags, large but
/// plausible corrections) are never raised through this type: they are
/// recorded as [`crate::diagnostics::Diagnostic`] entries in the result
/// aggregates so callers can read non-fatal conditions without exception
/// handling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LevelnetError {
    #[error("Invalid input data: {0}")]
    DataValidation(String),

    #[error("Calculation failed during {stage}: {message}")]
    Calculation { stage: String, message: String },

    #[error("Matrix {name} ({rows}x{cols}) rejected during {operation}: {message}")]
    Matrix {
        name: String,
        rows: usize,
        cols: usize,
        operation: String,
        message: String,
    },

    #[error("Precision bound breached: {message} ({value_mm:.1} mm)")]
    Precision { message: String, value_mm: f64 },

    #[error("Not enough redundancy: {observations} observations for {unknowns} unknowns")]
    InsufficientRedundancy { observations: usize, unknowns: usize },

    #[error("Invalid leveling parameters: {0}")]
    InvalidParameters(String),
}

impl LevelnetError {
    pub(crate) fn calculation(stage: &str, message: impl Into<String>) -> Self {
        LevelnetError::Calculation {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn matrix(
        name: &str,
        shape: (usize, usize),
        operation: &str,
        message: impl Into<String>,
    ) -> Self {
        LevelnetError::Matrix {
            name: name.to_string(),
            rows: shape.0,
            cols: shape.1,
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LevelnetError>;
