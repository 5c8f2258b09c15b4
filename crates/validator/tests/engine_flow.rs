//! End-to-end engine scenarios against stub gateways and a local HTTP
//! server.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use validator::{
    BuildResult, ClusterOps, ContainerOps, CriteriaType, EngineConfig, GatewayError, ImageInfo,
    RawCheck, RawCriteria, RetryOptions, ValidationCheck, ValidationCriteria, ValidationEngine,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("validator=debug")
        .with_test_writer()
        .try_init();
}

/// Cluster stub that only answers availability probes.
struct StubCluster {
    available: bool,
}

#[async_trait]
impl ClusterOps for StubCluster {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn get_resource(
        &self,
        _kind: &str,
        _name: &str,
        _namespace: &str,
    ) -> Result<Option<Value>, GatewayError> {
        Ok(None)
    }

    async fn list_resources<'a>(
        &self,
        _kind: &str,
        _namespace: Option<&'a str>,
    ) -> Result<Vec<Value>, GatewayError> {
        Ok(Vec::new())
    }

    async fn exec(
        &self,
        _pod: &str,
        _namespace: &str,
        _argv: &[String],
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Other("exec not supported by stub".into()))
    }

    async fn current_context(&self) -> Result<String, GatewayError> {
        Ok("kind-kubedojo".to_string())
    }
}

struct StubContainer {
    available: bool,
}

#[async_trait]
impl ContainerOps for StubContainer {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn build_image(
        &self,
        _context_dir: &Path,
        _dockerfile: &Path,
        _tag: &str,
    ) -> Result<BuildResult, GatewayError> {
        Err(GatewayError::Other("build not supported by stub".into()))
    }

    async fn get_image(&self, _reference: &str) -> Result<Option<ImageInfo>, GatewayError> {
        Ok(None)
    }

    async fn list_images<'a>(
        &self,
        _reference_filter: Option<&'a str>,
    ) -> Result<Vec<ImageInfo>, GatewayError> {
        Ok(Vec::new())
    }
}

fn engine(
    cluster_available: bool,
    container_available: bool,
) -> ValidationEngine<StubCluster, StubContainer> {
    let config = EngineConfig {
        retry: RetryOptions {
            max_retries: 1,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
        },
        http_timeout: Duration::from_secs(2),
        shell: "sh".to_string(),
    };
    ValidationEngine::with_config(
        StubCluster {
            available: cluster_available,
        },
        StubContainer {
            available: container_available,
        },
        config,
    )
}

#[tokio::test]
async fn http_criteria_pass_end_to_end() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let criteria = ValidationCriteria::new(
        CriteriaType::Http,
        vec![ValidationCheck::http(validator::HttpExpectation {
            method: "GET".into(),
            url: format!("{}/healthz", server.uri()),
            expected_status: 200,
            expected_body: Some(json!({"status": "ok"})),
        })],
    );

    let result = engine(false, false).validate_step("deploy-1", &criteria).await;

    assert!(result.success, "details: {:?}", result.details);
    assert_eq!(result.message, "Step deploy-1 validation passed");
    assert_eq!(result.details.len(), 1);
    assert!(result.suggestions.is_empty());
}

#[tokio::test]
async fn http_status_mismatch_fails_with_suggestions() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let criteria = ValidationCriteria::new(
        CriteriaType::Http,
        vec![ValidationCheck::http(validator::HttpExpectation {
            method: "GET".into(),
            url: format!("{}/healthz", server.uri()),
            expected_status: 200,
            expected_body: None,
        })],
    );

    let result = engine(false, false).validate_step("deploy-1", &criteria).await;

    assert!(!result.success);
    assert_eq!(
        result.message,
        "Step deploy-1 validation failed: 1 check(s) failed"
    );
    assert!(result.details[0].starts_with("FAILED:"));
    assert!(!result.suggestions.is_empty());
}

#[tokio::test]
async fn unreachable_cluster_yields_the_fixed_gating_result() {
    init_tracing();
    let criteria = ValidationCriteria::new(
        CriteriaType::Cluster,
        vec![ValidationCheck::command("kubectl get ns training", None)],
    );

    let result = engine(false, true).validate_step("setup-1", &criteria).await;

    assert!(!result.success);
    assert_eq!(result.message, "Kubernetes cluster is unavailable");
    assert!(result.details.is_empty(), "no check may have run");
    assert!(!result.suggestions.is_empty());
}

#[tokio::test]
async fn command_checks_aggregate_in_declared_order() {
    init_tracing();
    let criteria = ValidationCriteria::new(
        CriteriaType::Cluster,
        vec![
            ValidationCheck::command("echo ready", Some("ready".into())),
            ValidationCheck::command("echo nope", Some("ready".into())),
            ValidationCheck::command("true", None),
        ],
    );

    let result = engine(true, false).validate_step("step-2", &criteria).await;

    assert!(!result.success);
    assert_eq!(result.details.len(), 3);
    assert!(result.details[0].starts_with("Command succeeded"));
    assert!(result.details[1].starts_with("FAILED:"));
    assert!(result.details[1].contains("nope"));
    assert!(result.details[2].starts_with("Command succeeded"));
}

#[tokio::test]
async fn connection_refused_exhausts_retries_then_reports() {
    init_tracing();
    // Nothing listens on port 9; each attempt fails with a transient
    // connect error, so the retry budget (1 retry) is spent first.
    let criteria = ValidationCriteria::new(
        CriteriaType::Http,
        vec![ValidationCheck::http(validator::HttpExpectation {
            method: "GET".into(),
            url: "http://127.0.0.1:9/healthz".into(),
            expected_status: 200,
            expected_body: None,
        })],
    );

    let result = engine(false, false).validate_step("svc-1", &criteria).await;

    assert!(!result.success);
    assert!(
        result.details[0].starts_with("Check failed after retries:"),
        "detail: {}",
        result.details[0]
    );
    assert!(!result.suggestions.is_empty());
}

#[tokio::test]
async fn legacy_content_with_an_empty_check_reports_the_config_error() {
    init_tracing();
    let raw = RawCriteria {
        criteria_type: CriteriaType::Custom,
        checks: vec![RawCheck::default()],
    };
    let criteria = ValidationCriteria::from_raw_lossy(raw);

    let result = engine(false, false).validate_step("legacy-1", &criteria).await;

    assert!(!result.success);
    assert_eq!(result.details.len(), 1);
    assert!(
        result.details[0].contains("no validation method specified"),
        "detail: {}",
        result.details[0]
    );
    assert!(!result.suggestions.is_empty());
}
