//! Validation outcome types shared with the UI layer.

use serde::{Deserialize, Serialize};

/// Outcome of a single check execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
    pub message: String,
}

impl CheckResult {
    #[must_use]
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Aggregate outcome of one `validate_step` call. Serializable so the UI
/// layer can ship it over IPC unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub success: bool,
    pub message: String,
    /// One entry per check, pass or fail, in declared order.
    pub details: Vec<String>,
    /// Ordered remediation guidance; empty only when the run passed.
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn total_checks(&self) -> usize {
        self.details.len()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.details
            .iter()
            .filter(|d| d.starts_with("FAILED:") || d.starts_with("Check failed after retries:"))
            .count()
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.total_checks() - self.failed_count()
    }
}
