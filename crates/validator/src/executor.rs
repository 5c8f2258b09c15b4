//! Executes one atomic check and reports pass/fail.
//!
//! A check that completes with a wrong answer returns a failed
//! [`CheckResult`]; only transport-level failures that the retry policy
//! should see are returned as [`CheckError`].

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::criteria::{CheckContext, CustomValidator, HttpExpectation, ValidationCheck};
use crate::error::{is_transient_text, CheckError};
use crate::result::CheckResult;

/// Stateless executor shared by all checks of an engine instance.
pub struct CheckExecutor {
    http: HttpClient,
    shell: String,
}

impl CheckExecutor {
    #[must_use]
    pub fn new(http_timeout: Duration, shell: impl Into<String>) -> Self {
        let http = HttpClient::builder()
            .user_agent("kubedojo-validator/0.4")
            .timeout(http_timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            shell: shell.into(),
        }
    }

    #[instrument(skip(self, check, ctx), fields(check = %check.describe()))]
    pub async fn execute(
        &self,
        check: &ValidationCheck,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        match check {
            ValidationCheck::Command {
                command,
                expected_output,
            } => self.execute_command(command, expected_output.as_deref()).await,
            ValidationCheck::Http { request } => self.execute_http(request).await,
            ValidationCheck::Custom { name, validator } => {
                Ok(Self::execute_custom(name, validator, ctx))
            }
        }
    }

    async fn execute_command(
        &self,
        command: &str,
        expected: Option<&str>,
    ) -> Result<CheckResult, CheckError> {
        let output = match Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .output()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let message = err.to_string();
                if is_transient_text(&message) {
                    return Err(CheckError::Command {
                        command: command.to_string(),
                        message,
                    });
                }
                return Ok(CheckResult::fail(format!(
                    "Command failed: {command} - {message}"
                )));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_string();

        if !output.status.success() {
            if is_transient_text(&combined) {
                return Err(CheckError::Command {
                    command: command.to_string(),
                    message: combined,
                });
            }
            let mut message = format!("Command failed: {command} - {combined}");
            if combined.contains("not found") || combined.contains("NotFound") {
                message.push_str(" (has the resource been created yet?)");
            }
            return Ok(CheckResult::fail(message));
        }

        match expected {
            Some(want) if !combined.contains(want) => Ok(CheckResult::fail(format!(
                "Expected output containing {want:?}, got: {combined}"
            ))),
            _ => Ok(CheckResult::pass(format!("Command succeeded: {command}"))),
        }
    }

    async fn execute_http(&self, request: &HttpExpectation) -> Result<CheckResult, CheckError> {
        let Ok(method) = reqwest::Method::from_bytes(request.method.as_bytes()) else {
            return Ok(CheckResult::fail(format!(
                "Invalid HTTP method: {}",
                request.method
            )));
        };

        // 4xx/5xx are responses to compare, never errors.
        let response = match self.http.request(method, &request.url).send().await {
            Ok(response) => response,
            Err(err) if err.is_connect() || err.is_timeout() => {
                return Err(CheckError::Http(err));
            }
            Err(err) => {
                return Ok(CheckResult::fail(format!("HTTP request failed: {err}")));
            }
        };

        let status = response.status().as_u16();
        if status != request.expected_status {
            return Ok(CheckResult::fail(format!(
                "Expected HTTP {} from {}, got {status}",
                request.expected_status, request.url
            )));
        }

        if let Some(expected_body) = &request.expected_body {
            let text = match response.text().await {
                Ok(text) => text,
                Err(err) => {
                    return Ok(CheckResult::fail(format!(
                        "Failed to read response body: {err}"
                    )));
                }
            };
            if !body_matches(expected_body, &text) {
                return Ok(CheckResult::fail(format!(
                    "Response body mismatch for {}: expected {expected_body}, got {}",
                    request.url,
                    text.trim()
                )));
            }
        }

        Ok(CheckResult::pass(format!(
            "{} {} returned {status}",
            request.method, request.url
        )))
    }

    fn execute_custom(name: &str, validator: &CustomValidator, ctx: &CheckContext) -> CheckResult {
        match validator(ctx) {
            Ok(true) => CheckResult::pass(format!("Custom check passed: {name}")),
            Ok(false) => CheckResult::fail(format!("Custom check failed: {name}")),
            Err(err) => {
                debug!("custom check {name} errored: {err:#}");
                CheckResult::fail(format!("Custom check {name}: {err}"))
            }
        }
    }
}

/// Structural comparison when the response parses as JSON, literal string
/// comparison otherwise.
fn body_matches(expected: &Value, actual_text: &str) -> bool {
    match serde_json::from_str::<Value>(actual_text) {
        Ok(actual) => actual == *expected,
        Err(_) => expected.as_str() == Some(actual_text.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor() -> CheckExecutor {
        CheckExecutor::new(Duration::from_secs(5), "sh")
    }

    fn http_check(url: String, expected_status: u16, expected_body: Option<Value>) -> HttpExpectation {
        HttpExpectation {
            method: "GET".into(),
            url,
            expected_status,
            expected_body,
        }
    }

    #[tokio::test]
    async fn command_output_match_passes() {
        let check = ValidationCheck::command("echo ready", Some("ready".into()));
        let result = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn command_output_mismatch_reports_observed_output() {
        let check = ValidationCheck::command("echo nope", Some("ready".into()));
        let result = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.contains("nope"), "message: {}", result.message);
    }

    #[tokio::test]
    async fn command_without_expectation_passes_on_exit_zero() {
        let check = ValidationCheck::command("true", None);
        let result = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn failing_command_with_not_found_output_gets_the_hint() {
        let check =
            ValidationCheck::command("echo 'deployments.apps \"web\" not found' >&2; exit 1", None);
        let result = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.starts_with("Command failed:"));
        assert!(result.message.contains("has the resource been created"));
    }

    #[tokio::test]
    async fn http_status_mismatch_reports_both_codes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let check = ValidationCheck::http(http_check(format!("{}/missing", server.uri()), 200, None));
        let result = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.contains("200"), "message: {}", result.message);
        assert!(result.message.contains("404"), "message: {}", result.message);
    }

    #[tokio::test]
    async fn http_body_structural_match_passes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "replicas": 3})),
            )
            .mount(&server)
            .await;

        let check = ValidationCheck::http(http_check(
            format!("{}/healthz", server.uri()),
            200,
            Some(json!({"replicas": 3, "status": "ok"})),
        ));
        let result = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap();
        assert!(result.success, "message: {}", result.message);
    }

    #[tokio::test]
    async fn http_plain_text_body_compares_as_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v2\n"))
            .mount(&server)
            .await;

        let check = ValidationCheck::http(http_check(
            format!("{}/version", server.uri()),
            200,
            Some(json!("v2")),
        ));
        let result = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap();
        assert!(result.success, "message: {}", result.message);
    }

    #[tokio::test]
    async fn connection_refused_surfaces_as_transient_error() {
        // Port 9 on localhost is not listening.
        let check = ValidationCheck::http(http_check("http://127.0.0.1:9/".into(), 200, None));
        let err = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn custom_predicate_error_is_a_failure_not_an_error() {
        let check = ValidationCheck::custom("quota", |_| Err(anyhow::anyhow!("boom")));
        let result = executor()
            .execute(&check, &CheckContext::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.contains("boom"));
    }

    #[tokio::test]
    async fn custom_predicate_sees_the_step_context() {
        let check = ValidationCheck::custom("step-aware", |ctx| Ok(ctx.step_id == "step-3"));
        let ctx = CheckContext {
            step_id: "step-3".into(),
        };
        let result = executor().execute(&check, &ctx).await.unwrap();
        assert!(result.success);
    }
}
