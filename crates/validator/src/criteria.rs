//! Criteria and check data model for exercise steps.
//!
//! Criteria are authored as JSON in lesson content (camelCase fields) and
//! deserialized through raw mirror structs. A check carries exactly one
//! execution mode; that invariant is enforced when the raw form is
//! converted, not at execution time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which infrastructure a step's checks target. Cluster and Container
/// criteria are gated on an availability probe before any check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriteriaType {
    Cluster,
    Container,
    Http,
    Custom,
}

/// Expected request/response pair for an HTTP check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpExpectation {
    pub method: String,
    pub url: String,
    pub expected_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_body: Option<serde_json::Value>,
}

/// Context handed to custom validator closures.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    pub step_id: String,
}

/// User-supplied predicate for checks that cannot be expressed as a command
/// or HTTP expectation. Errors are reported as check failures and are never
/// classified transient.
pub type CustomValidator = Arc<dyn Fn(&CheckContext) -> anyhow::Result<bool> + Send + Sync>;

/// One atomic pass/fail assertion.
#[derive(Clone)]
pub enum ValidationCheck {
    /// Run a shell command; optionally require the combined output to
    /// contain `expected_output`.
    Command {
        command: String,
        expected_output: Option<String>,
    },
    /// Issue an HTTP request and compare status (and optionally body).
    Http { request: HttpExpectation },
    /// Invoke a registered predicate.
    Custom {
        name: String,
        validator: CustomValidator,
    },
}

impl fmt::Debug for ValidationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command {
                command,
                expected_output,
            } => f
                .debug_struct("Command")
                .field("command", command)
                .field("expected_output", expected_output)
                .finish(),
            Self::Http { request } => f.debug_struct("Http").field("request", request).finish(),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

impl ValidationCheck {
    #[must_use]
    pub fn command(command: impl Into<String>, expected_output: Option<String>) -> Self {
        Self::Command {
            command: command.into(),
            expected_output,
        }
    }

    #[must_use]
    pub fn http(request: HttpExpectation) -> Self {
        Self::Http { request }
    }

    pub fn custom<F>(name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&CheckContext) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            validator: Arc::new(validator),
        }
    }

    /// Short human-readable label used in log lines.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Command { command, .. } => format!("command: {command}"),
            Self::Http { request } => format!("http: {} {}", request.method, request.url),
            Self::Custom { name, .. } => format!("custom: {name}"),
        }
    }
}

/// Raw JSON shape of a check as authored in lesson content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpExpectation>,
}

/// Raw JSON shape of a step's criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCriteria {
    #[serde(rename = "type")]
    pub criteria_type: CriteriaType,
    pub checks: Vec<RawCheck>,
}

/// Configuration errors detected when building checks from raw content.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CriteriaError {
    #[error("no validation method specified")]
    NoMethod,

    #[error("multiple validation methods specified")]
    MultipleMethods,
}

impl TryFrom<RawCheck> for ValidationCheck {
    type Error = CriteriaError;

    fn try_from(raw: RawCheck) -> Result<Self, Self::Error> {
        match (raw.command, raw.http_request) {
            (Some(command), None) => Ok(Self::Command {
                command,
                expected_output: raw.expected_output,
            }),
            (None, Some(request)) => Ok(Self::Http { request }),
            (None, None) => Err(CriteriaError::NoMethod),
            (Some(_), Some(_)) => Err(CriteriaError::MultipleMethods),
        }
    }
}

/// The full set of checks associated with one exercise step.
#[derive(Debug, Clone)]
pub struct ValidationCriteria {
    pub criteria_type: CriteriaType,
    pub checks: Vec<ValidationCheck>,
}

impl ValidationCriteria {
    #[must_use]
    pub fn new(criteria_type: CriteriaType, checks: Vec<ValidationCheck>) -> Self {
        Self {
            criteria_type,
            checks,
        }
    }

    /// Strict construction: any malformed check rejects the whole criteria.
    pub fn from_raw(raw: RawCriteria) -> Result<Self, CriteriaError> {
        let checks = raw
            .checks
            .into_iter()
            .map(ValidationCheck::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(raw.criteria_type, checks))
    }

    /// Lenient construction for legacy content: a malformed check is kept as
    /// a check that always fails with the configuration error, so the step
    /// still validates end to end and reports the authoring mistake as an
    /// ordinary failed check.
    #[must_use]
    pub fn from_raw_lossy(raw: RawCriteria) -> Self {
        let checks = raw
            .checks
            .into_iter()
            .map(|raw_check| match ValidationCheck::try_from(raw_check) {
                Ok(check) => check,
                Err(err) => {
                    ValidationCheck::custom("invalid", move |_| Err(anyhow::anyhow!("{err}")))
                }
            })
            .collect();
        Self::new(raw.criteria_type, checks)
    }
}

impl TryFrom<RawCriteria> for ValidationCriteria {
    type Error = CriteriaError;

    fn try_from(raw: RawCriteria) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}
