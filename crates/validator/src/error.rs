//! Error types for the validation engine.
//!
//! Raw SDK errors are translated into a closed set of semantic kinds at the
//! gateway boundary so retry classification can match on kind instead of
//! substrings of free-text messages. Shell command output has no structure,
//! so a substring table survives for that surface only.

use thiserror::Error;

/// Errors surfaced by the cluster and container gateways.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The API server or daemon cannot be reached at all.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The requested resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The credentials in use are not allowed to perform the operation.
    #[error("permission denied: {0}")]
    Forbidden(String),

    /// A server-side error likely to clear on retry.
    #[error("transient API error ({status}): {message}")]
    Transient { status: u16, message: String },

    /// Invalid input, such as an unknown resource kind.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// True for error kinds worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Unreachable(_))
    }
}

/// Errors thrown out of a single check execution.
///
/// A check that completes with a wrong answer is not an error, it is a
/// failed `CheckResult`. This type covers transport-level failures only,
/// which is what the retry policy operates on.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The shell command could not complete against the infrastructure.
    #[error("command failed: {command} - {message}")]
    Command { command: String, message: String },

    /// The HTTP request never produced a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A gateway call failed underneath the check.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl CheckError {
    /// Retryability classification for the engine's retry wrapper.
    ///
    /// Gateway and HTTP errors are classified structurally; command output
    /// falls back to the substring table.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Command { message, .. } => is_transient_text(message),
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            Self::Gateway(err) => err.is_transient(),
        }
    }
}

/// Engine-level failures that abort a validation run before or outside the
/// check loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Kubernetes cluster is unavailable")]
    ClusterUnavailable,

    #[error("Docker daemon is unavailable")]
    ContainerRuntimeUnavailable,

    #[error("{0}")]
    Internal(String),
}

/// Patterns indicating a failure likely to clear on retry: network blips,
/// API-server 5xx responses, daemon connection hiccups.
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "econnrefused",
    "etimedout",
    "enotfound",
    "i/o timeout",
    "timed out",
    "tls handshake timeout",
    "no route to host",
    "temporarily unavailable",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "error 502",
    "error 503",
    "error 504",
    "cannot connect to the docker daemon",
    "dial unix",
    "dial tcp",
];

/// Substring classification for surfaces with no structured errors.
pub(crate) fn is_transient_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_connection_text_is_transient() {
        assert!(is_transient_text(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock"
        ));
        assert!(is_transient_text("dial tcp 10.0.0.1:6443: i/o timeout"));
        assert!(is_transient_text("The connection to the server was refused: connection refused"));
    }

    #[test]
    fn ordinary_failure_text_is_not_transient() {
        assert!(!is_transient_text("Error from server (NotFound): deployments.apps \"web\" not found"));
        assert!(!is_transient_text("exit status 1"));
    }

    #[test]
    fn gateway_kinds_classify_structurally() {
        assert!(GatewayError::Unreachable("down".into()).is_transient());
        assert!(GatewayError::Transient { status: 503, message: "busy".into() }.is_transient());
        assert!(!GatewayError::NotFound("web".into()).is_transient());
        assert!(!GatewayError::Forbidden("rbac".into()).is_transient());
    }

    #[test]
    fn command_errors_classify_by_message_text() {
        let transient = CheckError::Command {
            command: "kubectl get pods".into(),
            message: "Unable to connect to the server: dial tcp: i/o timeout".into(),
        };
        assert!(transient.is_transient());

        let genuine = CheckError::Command {
            command: "kubectl get pods".into(),
            message: "error: unknown flag".into(),
        };
        assert!(!genuine.is_transient());
    }
}
