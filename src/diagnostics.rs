//! Soft anomalies recorded alongside results.
//!
//! The pipelines never raise for recoverable conditions (channel
//! disagreements, closure overruns, large but plausible corrections).
//! Those are collected as [`Diagnostic`] entries on the result aggregates
//! and mirrored on the `log` facade.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// One soft anomaly emitted by a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stage that emitted the diagnostic, e.g. `"height differences"`.
    pub stage: String,
    pub message: String,
}

impl Diagnostic {
    pub fn info(stage: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Info,
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(stage: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.stage, self.message)
    }
}

/// Push a warning diagnostic and mirror it on the log facade.
pub(crate) fn push_warning(diagnostics: &mut Vec<Diagnostic>, stage: &str, message: String) {
    log::warn!("{stage}: {message}");
    diagnostics.push(Diagnostic::warning(stage, message));
}

/// Push an informational diagnostic and mirror it on the log facade.
pub(crate) fn push_info(diagnostics: &mut Vec<Diagnostic>, stage: &str, message: String) {
    log::debug!("{stage}: {message}");
    diagnostics.push(Diagnostic::info(stage, message));
}

#[cfg(test)]
mod test_diagnostics {
    use super::*;

    #[test]
    fn test_display() {
        let d = Diagnostic::warning("closure", "closure 3.1 mm exceeds tolerance 2.5 mm");
        assert_eq!(
            d.to_string(),
            "[warning] closure: closure 3.1 mm exceeds tolerance 2.5 mm"
        );
    }
}
