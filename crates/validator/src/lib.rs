//! Exercise validation engine for the Kubedojo training app.
//!
//! Lessons describe hands-on exercise steps; each step carries validation
//! criteria (shell commands, HTTP expectations, custom predicates) that are
//! checked against live infrastructure - a Kubernetes cluster and/or the
//! local Docker daemon. This crate owns that checking:
//!
//! 1. **Gating** - criteria targeting the cluster or the container runtime
//!    first probe availability (cached per engine instance) and short-
//!    circuit with fixed remediation guidance when the backend is down.
//! 2. **Execution** - checks run sequentially, each wrapped in an
//!    exponential-backoff retry that only fires for transient failures.
//! 3. **Aggregation** - per-check details are collected in order and a
//!    step passes only when every check passed.
//! 4. **Suggestion synthesis** - failure messages are pattern-matched
//!    against known error signatures (not-found, pending, image-pull,
//!    crash-loop, permission, connection) to produce ordered remediation
//!    text.
//!
//! [`ValidationEngine::validate_step`] never returns an error: every
//! outcome, including internal failures, is a [`ValidationResult`] the UI
//! can render.

pub mod assertions;
pub mod availability;
pub mod config;
pub mod criteria;
pub mod engine;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod result;
pub mod retry;
pub mod suggestions;

pub use availability::{Availability, AvailabilityCache, Subsystem};
pub use config::EngineConfig;
pub use criteria::{
    CheckContext, CriteriaError, CriteriaType, CustomValidator, HttpExpectation, RawCheck,
    RawCriteria, ValidationCheck, ValidationCriteria,
};
pub use engine::ValidationEngine;
pub use error::{CheckError, EngineError, GatewayError};
pub use executor::CheckExecutor;
pub use gateway::{
    BuildResult, ClusterOps, ContainerOps, DockerCliGateway, ImageInfo, KubeClusterGateway,
};
pub use result::{CheckResult, ValidationResult};
pub use retry::{retry_with_backoff, RetryOptions};
