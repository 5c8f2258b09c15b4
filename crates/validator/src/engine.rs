//! Validation orchestration: availability gating, retry-wrapped check
//! execution, aggregation, and suggestion synthesis.
//!
//! One engine instance serves many `validate_step` calls. Checks within a
//! run execute sequentially because later checks may depend on side effects
//! of earlier ones; concurrent runs share only the availability cache.

use tracing::{debug, info, instrument, warn};

use crate::availability::{Availability, AvailabilityCache, Subsystem};
use crate::config::EngineConfig;
use crate::criteria::{CheckContext, CriteriaType, ValidationCriteria};
use crate::error::{CheckError, EngineError};
use crate::executor::CheckExecutor;
use crate::gateway::{ClusterOps, ContainerOps, DockerCliGateway, KubeClusterGateway};
use crate::result::ValidationResult;
use crate::retry::retry_with_backoff;
use crate::suggestions;

/// Validates exercise steps against live infrastructure.
///
/// The public contract never returns an error and never panics: every
/// failure mode, including internal ones, resolves to a
/// [`ValidationResult`] with a message and remediation suggestions.
pub struct ValidationEngine<C = KubeClusterGateway, D = DockerCliGateway>
where
    C: ClusterOps,
    D: ContainerOps,
{
    pub(crate) cluster: C,
    pub(crate) container: D,
    pub(crate) executor: CheckExecutor,
    availability: AvailabilityCache,
    config: EngineConfig,
}

impl<C, D> ValidationEngine<C, D>
where
    C: ClusterOps,
    D: ContainerOps,
{
    #[must_use]
    pub fn new(cluster: C, container: D) -> Self {
        Self::with_config(cluster, container, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(cluster: C, container: D, config: EngineConfig) -> Self {
        let executor = CheckExecutor::new(config.http_timeout, config.shell.clone());
        Self {
            cluster,
            container,
            executor,
            availability: AvailabilityCache::new(),
            config,
        }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub fn container(&self) -> &D {
        &self.container
    }

    /// Forget cached availability, forcing a fresh probe on the next gated
    /// validation. Call after the user reports having fixed their
    /// environment.
    pub fn reset_availability_cache(&self) {
        debug!("availability cache reset");
        self.availability.reset();
    }

    /// Validate one exercise step against its criteria.
    #[instrument(skip(self, criteria), fields(step_id = %step_id, checks = criteria.checks.len()))]
    pub async fn validate_step(
        &self,
        step_id: &str,
        criteria: &ValidationCriteria,
    ) -> ValidationResult {
        match self.run_validation(step_id, criteria).await {
            Ok(result) => result,
            Err(EngineError::ClusterUnavailable) => {
                warn!("step {step_id}: cluster unavailable, checks skipped");
                ValidationResult {
                    success: false,
                    message: "Kubernetes cluster is unavailable".to_string(),
                    details: Vec::new(),
                    suggestions: suggestions::cluster_unavailable(),
                }
            }
            Err(EngineError::ContainerRuntimeUnavailable) => {
                warn!("step {step_id}: container runtime unavailable, checks skipped");
                ValidationResult {
                    success: false,
                    message: "Docker daemon is unavailable".to_string(),
                    details: Vec::new(),
                    suggestions: suggestions::container_runtime_unavailable(),
                }
            }
            Err(EngineError::Internal(message)) => {
                warn!("step {step_id}: internal validation error: {message}");
                ValidationResult {
                    success: false,
                    message: format!("Validation error: {message}"),
                    details: Vec::new(),
                    suggestions: suggestions::generic(criteria.criteria_type),
                }
            }
        }
    }

    async fn run_validation(
        &self,
        step_id: &str,
        criteria: &ValidationCriteria,
    ) -> Result<ValidationResult, EngineError> {
        match criteria.criteria_type {
            CriteriaType::Cluster => self.ensure_available(Subsystem::Cluster).await?,
            CriteriaType::Container => self.ensure_available(Subsystem::Container).await?,
            CriteriaType::Http | CriteriaType::Custom => {}
        }

        let ctx = CheckContext {
            step_id: step_id.to_string(),
        };
        let mut details = Vec::with_capacity(criteria.checks.len());
        let mut failures = Vec::new();

        for check in &criteria.checks {
            let outcome = retry_with_backoff(&self.config.retry, CheckError::is_transient, || {
                self.executor.execute(check, &ctx)
            })
            .await;

            match outcome {
                Ok(result) if result.success => details.push(result.message),
                Ok(result) => {
                    debug!("step {step_id}: check failed: {}", result.message);
                    failures.push(result.message.clone());
                    details.push(format!("FAILED: {}", result.message));
                }
                // The executor itself threw and retries ran out; this is a
                // different failure than a check that completed false.
                Err(err) => {
                    debug!("step {step_id}: check errored after retries: {err}");
                    let message = format!("Check failed after retries: {err}");
                    failures.push(message.clone());
                    details.push(message);
                }
            }
        }

        let result = if failures.is_empty() {
            info!("step {step_id}: all {} check(s) passed", details.len());
            ValidationResult {
                success: true,
                message: format!("Step {step_id} validation passed"),
                details,
                suggestions: Vec::new(),
            }
        } else {
            info!(
                "step {step_id}: {}/{} check(s) failed",
                failures.len(),
                details.len()
            );
            ValidationResult {
                success: false,
                message: format!(
                    "Step {step_id} validation failed: {} check(s) failed",
                    failures.len()
                ),
                details,
                suggestions: suggestions::synthesize(criteria.criteria_type, &failures),
            }
        };
        Ok(result)
    }

    async fn ensure_available(&self, subsystem: Subsystem) -> Result<(), EngineError> {
        let available = match self.availability.get(subsystem) {
            Availability::Available => true,
            Availability::Unavailable => false,
            Availability::Unknown => {
                let up = match subsystem {
                    Subsystem::Cluster => self.cluster.is_available().await,
                    Subsystem::Container => self.container.is_available().await,
                };
                debug!("{subsystem:?} availability probe: {up}");
                self.availability.set(subsystem, up);
                up
            }
        };

        if available {
            Ok(())
        } else {
            Err(match subsystem {
                Subsystem::Cluster => EngineError::ClusterUnavailable,
                Subsystem::Container => EngineError::ContainerRuntimeUnavailable,
            })
        }
    }
}
