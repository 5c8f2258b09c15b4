//! Thin clients over the Kubernetes API and the Docker daemon.
//!
//! The engine depends on the [`ClusterOps`] and [`ContainerOps`] traits so
//! tests can substitute mocks; production code uses [`KubeClusterGateway`]
//! and [`DockerCliGateway`]. Both implementations translate raw SDK errors
//! into the closed [`GatewayError`] set at this boundary.

pub mod cluster;
pub mod container;

use std::path::Path;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::error::GatewayError;
pub use cluster::KubeClusterGateway;
pub use container::{BuildResult, DockerCliGateway, ImageInfo};

/// Cluster operations the engine depends on.
///
/// Resource `kind` strings accept singular, plural, and kubectl short names
/// (pod/pods/po, deployment, service, configmap, secret,
/// persistentvolumeclaim/pvc, namespace, horizontalpodautoscaler/hpa,
/// statefulset, daemonset, job, ingress).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Probe the API server with a cheap list call.
    async fn is_available(&self) -> bool;

    /// Fetch one resource as JSON; `Ok(None)` when it does not exist.
    async fn get_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Value>, GatewayError>;

    /// List resources of a kind, cluster-wide when `namespace` is `None`.
    async fn list_resources<'a>(
        &self,
        kind: &str,
        namespace: Option<&'a str>,
    ) -> Result<Vec<Value>, GatewayError>;

    /// Run a command inside a pod and return its combined output.
    async fn exec(
        &self,
        pod: &str,
        namespace: &str,
        argv: &[String],
    ) -> Result<String, GatewayError>;

    /// Name of the kubeconfig context in use.
    async fn current_context(&self) -> Result<String, GatewayError>;
}

/// Container-runtime operations the engine depends on.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Probe the daemon.
    async fn is_available(&self) -> bool;

    /// Build an image from a context directory and tag it.
    async fn build_image(
        &self,
        context_dir: &Path,
        dockerfile: &Path,
        tag: &str,
    ) -> Result<BuildResult, GatewayError>;

    /// Inspect one image; `Ok(None)` when it does not exist.
    async fn get_image(&self, reference: &str) -> Result<Option<ImageInfo>, GatewayError>;

    /// List local images, optionally filtered by repository reference.
    async fn list_images<'a>(
        &self,
        reference_filter: Option<&'a str>,
    ) -> Result<Vec<ImageInfo>, GatewayError>;
}
