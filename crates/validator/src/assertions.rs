//! Narrow boolean resource assertions consumed by the exercise UI.
//!
//! Each helper is a thin composition over the gateways with plain boolean
//! semantics: a missing resource, a mismatch, or any gateway error all
//! answer `false`. Failures are logged at debug level for troubleshooting,
//! never surfaced as errors.

use serde_json::Value;
use tracing::debug;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::criteria::{CheckContext, HttpExpectation, ValidationCheck};
use crate::engine::ValidationEngine;
use crate::error::GatewayError;
use crate::gateway::{ClusterOps, ContainerOps};

impl<C, D> ValidationEngine<C, D>
where
    C: ClusterOps,
    D: ContainerOps,
{
    /// All pods selected by the deployment are Running and Ready, and at
    /// least one exists.
    pub async fn deployment_pods_running(&self, name: &str, namespace: &str) -> bool {
        self.check_deployment_pods(name, namespace)
            .await
            .unwrap_or_else(|err| {
                debug!("deployment_pods_running({namespace}/{name}): {err}");
                false
            })
    }

    async fn check_deployment_pods(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<bool, GatewayError> {
        let Some(deployment) = self.cluster.get_resource("deployment", name, namespace).await?
        else {
            return Ok(false);
        };
        let Some(selector) = deployment
            .pointer("/spec/selector/matchLabels")
            .and_then(Value::as_object)
        else {
            return Ok(false);
        };

        let pods = self.cluster.list_resources("pod", Some(namespace)).await?;
        let mut matched = false;
        for pod in &pods {
            let labels = pod.pointer("/metadata/labels").and_then(Value::as_object);
            let selected = labels.is_some_and(|labels| {
                selector
                    .iter()
                    .all(|(key, value)| labels.get(key) == Some(value))
            });
            if !selected {
                continue;
            }
            matched = true;
            if pod.pointer("/status/phase").and_then(Value::as_str) != Some("Running") {
                return Ok(false);
            }
            if !pod_condition_true(pod, "Ready") {
                return Ok(false);
            }
        }
        Ok(matched)
    }

    /// The configmap exists and its data contains every expected key.
    pub async fn configmap_has_keys(&self, name: &str, namespace: &str, keys: &[&str]) -> bool {
        match self.cluster.get_resource("configmap", name, namespace).await {
            Ok(Some(cm)) => {
                let data = cm.pointer("/data").and_then(Value::as_object);
                data.is_some_and(|data| keys.iter().all(|key| data.contains_key(*key)))
            }
            Ok(None) => false,
            Err(err) => {
                debug!("configmap_has_keys({namespace}/{name}): {err}");
                false
            }
        }
    }

    /// Every data value of the secret decodes as base64.
    ///
    /// The API server normally guarantees this; the check exists for the
    /// lesson that has learners author secret manifests by hand.
    pub async fn secret_values_base64(&self, name: &str, namespace: &str) -> bool {
        match self.cluster.get_resource("secret", name, namespace).await {
            Ok(Some(secret)) => secret
                .pointer("/data")
                .and_then(Value::as_object)
                .is_some_and(|data| {
                    data.values().all(|value| {
                        value
                            .as_str()
                            .is_some_and(|encoded| BASE64.decode(encoded).is_ok())
                    })
                }),
            Ok(None) => false,
            Err(err) => {
                debug!("secret_values_base64({namespace}/{name}): {err}");
                false
            }
        }
    }

    /// The claim exists and reports phase Bound.
    pub async fn pvc_bound(&self, name: &str, namespace: &str) -> bool {
        match self.cluster.get_resource("pvc", name, namespace).await {
            Ok(Some(pvc)) => pvc.pointer("/status/phase").and_then(Value::as_str) == Some("Bound"),
            Ok(None) => false,
            Err(err) => {
                debug!("pvc_bound({namespace}/{name}): {err}");
                false
            }
        }
    }

    pub async fn namespace_exists(&self, name: &str) -> bool {
        match self.cluster.get_resource("namespace", name, "").await {
            Ok(found) => found.is_some(),
            Err(err) => {
                debug!("namespace_exists({name}): {err}");
                false
            }
        }
    }

    /// The image exists locally and carries every expected tag. A tag
    /// matches as a full reference (`repo:tag`) or as the bare tag part.
    pub async fn image_has_tags(&self, reference: &str, expected_tags: &[&str]) -> bool {
        match self.container.get_image(reference).await {
            Ok(Some(image)) => expected_tags.iter().all(|expected| {
                image.tags.iter().any(|tag| {
                    tag == expected || tag.rsplit_once(':').is_some_and(|(_, t)| t == *expected)
                })
            }),
            Ok(None) => false,
            Err(err) => {
                debug!("image_has_tags({reference}): {err}");
                false
            }
        }
    }

    /// The endpoint answers with the expected status (and body, when given).
    /// Runs through the same executor as HTTP checks, so transient network
    /// failures simply answer `false` here.
    pub async fn http_endpoint_matches(
        &self,
        url: &str,
        expected_status: u16,
        expected_body: Option<Value>,
    ) -> bool {
        let check = ValidationCheck::http(HttpExpectation {
            method: "GET".to_string(),
            url: url.to_string(),
            expected_status,
            expected_body,
        });
        match self.executor.execute(&check, &CheckContext::default()).await {
            Ok(result) => result.success,
            Err(err) => {
                debug!("http_endpoint_matches({url}): {err}");
                false
            }
        }
    }

    /// The URL is reachable from inside the pod, proving service DNS and
    /// connectivity between workloads.
    pub async fn service_reachable(&self, pod: &str, namespace: &str, url: &str) -> bool {
        let argv = vec![
            "wget".to_string(),
            "-qO-".to_string(),
            "--timeout=5".to_string(),
            url.to_string(),
        ];
        match self.cluster.exec(pod, namespace, &argv).await {
            Ok(_) => true,
            Err(err) => {
                debug!("service_reachable({namespace}/{pod} -> {url}): {err}");
                false
            }
        }
    }

    /// The pod mounts the named configmap/secret (as a volume or via
    /// `envFrom`) and exposes the expected environment variable names.
    pub async fn pod_mounts_config(
        &self,
        pod: &str,
        namespace: &str,
        source: &str,
        env_vars: &[&str],
    ) -> bool {
        let pod_json = match self.cluster.get_resource("pod", pod, namespace).await {
            Ok(Some(pod_json)) => pod_json,
            Ok(None) => return false,
            Err(err) => {
                debug!("pod_mounts_config({namespace}/{pod}): {err}");
                return false;
            }
        };

        let volumes = pod_json
            .pointer("/spec/volumes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mounted_as_volume = volumes.iter().any(|volume| {
            volume.pointer("/configMap/name").and_then(Value::as_str) == Some(source)
                || volume.pointer("/secret/secretName").and_then(Value::as_str) == Some(source)
        });

        let containers = pod_json
            .pointer("/spec/containers")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let referenced_via_env_from = containers.iter().any(|container| {
            container
                .pointer("/envFrom")
                .and_then(Value::as_array)
                .is_some_and(|sources| {
                    sources.iter().any(|entry| {
                        entry.pointer("/configMapRef/name").and_then(Value::as_str) == Some(source)
                            || entry.pointer("/secretRef/name").and_then(Value::as_str)
                                == Some(source)
                    })
                })
        });

        if !mounted_as_volume && !referenced_via_env_from {
            return false;
        }

        // envFrom injects every key of the source, so explicit names are
        // only required when the vars come from per-variable `env` entries.
        env_vars.iter().all(|var| {
            referenced_via_env_from
                || containers.iter().any(|container| {
                    container
                        .pointer("/env")
                        .and_then(Value::as_array)
                        .is_some_and(|env| {
                            env.iter().any(|entry| {
                                entry.pointer("/name").and_then(Value::as_str) == Some(*var)
                            })
                        })
                })
        })
    }

    /// Some container of the pod carries exactly the expected resource
    /// requests and limits (quantity strings compared literally).
    pub async fn pod_resources_match(
        &self,
        pod: &str,
        namespace: &str,
        requests: &[(&str, &str)],
        limits: &[(&str, &str)],
    ) -> bool {
        let pod_json = match self.cluster.get_resource("pod", pod, namespace).await {
            Ok(Some(pod_json)) => pod_json,
            Ok(None) => return false,
            Err(err) => {
                debug!("pod_resources_match({namespace}/{pod}): {err}");
                return false;
            }
        };

        let containers = pod_json
            .pointer("/spec/containers")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        containers.iter().any(|container| {
            let matches_all = |section: &str, expected: &[(&str, &str)]| {
                expected.iter().all(|(resource, quantity)| {
                    container
                        .pointer(&format!("/resources/{section}/{resource}"))
                        .and_then(Value::as_str)
                        == Some(*quantity)
                })
            };
            matches_all("requests", requests) && matches_all("limits", limits)
        })
    }

    pub async fn hpa_exists(&self, name: &str, namespace: &str) -> bool {
        match self.cluster.get_resource("hpa", name, namespace).await {
            Ok(found) => found.is_some(),
            Err(err) => {
                debug!("hpa_exists({namespace}/{name}): {err}");
                false
            }
        }
    }
}

fn pod_condition_true(pod: &Value, condition_type: &str) -> bool {
    pod.pointer("/status/conditions")
        .and_then(Value::as_array)
        .is_some_and(|conditions| {
            conditions.iter().any(|condition| {
                condition.pointer("/type").and_then(Value::as_str) == Some(condition_type)
                    && condition.pointer("/status").and_then(Value::as_str) == Some("True")
            })
        })
}
