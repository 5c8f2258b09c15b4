//! Kubernetes API gateway backed by `kube::Client`.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{
    Api, ApiResource, AttachParams, DynamicObject, GroupVersionKind, ListParams,
};
use kube::config::Kubeconfig;
use kube::{Client, Config};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

use super::ClusterOps;
use crate::error::GatewayError;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Thin wrapper over `kube::Client` exposing the handful of operations the
/// validation engine needs.
#[derive(Clone)]
pub struct KubeClusterGateway {
    client: Client,
    context: String,
    probe_timeout: Duration,
}

impl KubeClusterGateway {
    /// Connect using the ambient kubeconfig or in-cluster environment.
    pub async fn connect() -> Result<Self, GatewayError> {
        let config = Config::infer()
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))?;
        let client =
            Client::try_from(config).map_err(|err| GatewayError::Other(err.to_string()))?;

        // The kube Config does not retain the context name, so read it from
        // the kubeconfig file separately.
        let context = Kubeconfig::read()
            .ok()
            .and_then(|kc| kc.current_context)
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self::new(client, context))
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client, context: impl Into<String>) -> Self {
        Self {
            client,
            context: context.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Map a user-facing kind string (singular, plural, or kubectl short
    /// name) onto its group/version/kind.
    fn gvk_for(kind: &str) -> Option<GroupVersionKind> {
        let gvk = match kind.to_lowercase().as_str() {
            "pod" | "pods" | "po" => GroupVersionKind::gvk("", "v1", "Pod"),
            "deployment" | "deployments" | "deploy" => {
                GroupVersionKind::gvk("apps", "v1", "Deployment")
            }
            "service" | "services" | "svc" => GroupVersionKind::gvk("", "v1", "Service"),
            "configmap" | "configmaps" | "cm" => GroupVersionKind::gvk("", "v1", "ConfigMap"),
            "secret" | "secrets" => GroupVersionKind::gvk("", "v1", "Secret"),
            "persistentvolumeclaim" | "persistentvolumeclaims" | "pvc" => {
                GroupVersionKind::gvk("", "v1", "PersistentVolumeClaim")
            }
            "namespace" | "namespaces" | "ns" => GroupVersionKind::gvk("", "v1", "Namespace"),
            "horizontalpodautoscaler" | "horizontalpodautoscalers" | "hpa" => {
                GroupVersionKind::gvk("autoscaling", "v2", "HorizontalPodAutoscaler")
            }
            "statefulset" | "statefulsets" | "sts" => {
                GroupVersionKind::gvk("apps", "v1", "StatefulSet")
            }
            "daemonset" | "daemonsets" | "ds" => GroupVersionKind::gvk("apps", "v1", "DaemonSet"),
            "job" | "jobs" => GroupVersionKind::gvk("batch", "v1", "Job"),
            "ingress" | "ingresses" | "ing" => {
                GroupVersionKind::gvk("networking.k8s.io", "v1", "Ingress")
            }
            _ => return None,
        };
        Some(gvk)
    }

    fn dynamic_api(&self, gvk: &GroupVersionKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::from_gvk(gvk);
        // Namespace is the only cluster-scoped kind the engine recognizes.
        match namespace {
            Some(ns) if gvk.kind != "Namespace" => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    /// Translate `kube::Error` into the closed gateway error set.
    fn translate(err: kube::Error) -> GatewayError {
        match err {
            kube::Error::Api(response) => match response.code {
                404 => GatewayError::NotFound(response.message),
                401 | 403 => GatewayError::Forbidden(response.message),
                502 | 503 | 504 => GatewayError::Transient {
                    status: response.code,
                    message: response.message,
                },
                _ => GatewayError::Other(response.message),
            },
            kube::Error::HyperError(err) => GatewayError::Unreachable(err.to_string()),
            kube::Error::Service(err) => GatewayError::Unreachable(err.to_string()),
            other => GatewayError::Other(other.to_string()),
        }
    }
}

#[async_trait]
impl ClusterOps for KubeClusterGateway {
    #[instrument(skip(self))]
    async fn is_available(&self) -> bool {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let params = ListParams::default().limit(1);
        match tokio::time::timeout(self.probe_timeout, namespaces.list(&params)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!("cluster availability probe failed: {err}");
                false
            }
            Err(_) => {
                debug!("cluster availability probe timed out");
                false
            }
        }
    }

    #[instrument(skip(self), fields(kind = %kind, name = %name, namespace = %namespace))]
    async fn get_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Value>, GatewayError> {
        let gvk = Self::gvk_for(kind)
            .ok_or_else(|| GatewayError::Invalid(format!("unknown resource kind: {kind}")))?;
        let api = self.dynamic_api(&gvk, Some(namespace));

        match api.get(name).await {
            Ok(object) => {
                let value = serde_json::to_value(&object)
                    .map_err(|err| GatewayError::Other(err.to_string()))?;
                Ok(Some(value))
            }
            Err(err) => match Self::translate(err) {
                GatewayError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    #[instrument(skip(self), fields(kind = %kind, namespace = ?namespace))]
    async fn list_resources<'a>(
        &self,
        kind: &str,
        namespace: Option<&'a str>,
    ) -> Result<Vec<Value>, GatewayError> {
        let gvk = Self::gvk_for(kind)
            .ok_or_else(|| GatewayError::Invalid(format!("unknown resource kind: {kind}")))?;
        let api = self.dynamic_api(&gvk, namespace);

        let list = api
            .list(&ListParams::default())
            .await
            .map_err(Self::translate)?;

        list.items
            .iter()
            .map(|item| serde_json::to_value(item).map_err(|err| GatewayError::Other(err.to_string())))
            .collect()
    }

    #[instrument(skip(self, argv), fields(pod = %pod, namespace = %namespace))]
    async fn exec(
        &self,
        pod: &str,
        namespace: &str,
        argv: &[String],
    ) -> Result<String, GatewayError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let mut attached = pods
            .exec(pod, argv.to_vec(), &AttachParams::default())
            .await
            .map_err(Self::translate)?;

        let mut output = String::new();
        if let Some(mut stdout) = attached.stdout() {
            stdout
                .read_to_string(&mut output)
                .await
                .map_err(|err| GatewayError::Other(err.to_string()))?;
        }
        if let Some(mut stderr) = attached.stderr() {
            stderr
                .read_to_string(&mut output)
                .await
                .map_err(|err| GatewayError::Other(err.to_string()))?;
        }
        attached
            .join()
            .await
            .map_err(|err| GatewayError::Other(err.to_string()))?;

        Ok(output)
    }

    async fn current_context(&self) -> Result<String, GatewayError> {
        Ok(self.context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: message.into(),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn recognizes_all_documented_kind_aliases() {
        for kind in [
            "pod",
            "Deployment",
            "svc",
            "configmap",
            "secret",
            "pvc",
            "persistentvolumeclaim",
            "namespace",
            "hpa",
            "horizontalpodautoscaler",
            "statefulset",
            "daemonset",
            "job",
            "ingress",
        ] {
            assert!(
                KubeClusterGateway::gvk_for(kind).is_some(),
                "kind {kind} should resolve"
            );
        }
        assert!(KubeClusterGateway::gvk_for("widget").is_none());
    }

    #[test]
    fn hpa_resolves_to_autoscaling_v2() {
        let gvk = KubeClusterGateway::gvk_for("hpa").unwrap();
        assert_eq!(gvk.group, "autoscaling");
        assert_eq!(gvk.version, "v2");
    }

    #[test]
    fn api_status_codes_translate_to_semantic_kinds() {
        assert!(matches!(
            KubeClusterGateway::translate(api_error(404, "not found")),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            KubeClusterGateway::translate(api_error(403, "rbac")),
            GatewayError::Forbidden(_)
        ));
        assert!(matches!(
            KubeClusterGateway::translate(api_error(503, "etcd leader election")),
            GatewayError::Transient { status: 503, .. }
        ));
        assert!(matches!(
            KubeClusterGateway::translate(api_error(422, "invalid")),
            GatewayError::Other(_)
        ));
    }
}
