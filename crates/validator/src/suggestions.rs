//! Remediation suggestion synthesis from failure patterns.
//!
//! An ordered table of `(matcher, builder)` entries is evaluated against the
//! combined failure text; the first matching category produces the
//! suggestion block. Pure and total: every input yields at least the
//! generic guidance.

use lazy_static::lazy_static;
use regex::Regex;

use crate::criteria::CriteriaType;

lazy_static! {
    /// Pulls `{kind, name, namespace}` out of a kubectl read command quoted
    /// in a failure message, so the not-found guidance can name the exact
    /// resource the learner still has to create.
    static ref KUBECTL_TARGET: Regex = Regex::new(
        r"kubectl\s+(?:get|describe)\s+(?P<kind>[a-z]+)\s+(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)(?:.*?(?:-n\s+|--namespace[=\s]+)(?P<ns>[A-Za-z0-9-]+))?"
    )
    .expect("kubectl target regex is valid");
}

struct SynthesisInput<'a> {
    criteria_type: CriteriaType,
    failures: &'a [String],
    combined: String,
}

type Matcher = fn(&str) -> bool;
type Builder = fn(&SynthesisInput<'_>) -> Vec<String>;

/// Evaluated in priority order; first match wins.
const CATEGORIES: &[(Matcher, Builder)] = &[
    (matches_not_found, build_not_found),
    (matches_pending, build_pending),
    (matches_image_pull, build_image_pull),
    (matches_crash_loop, build_crash_loop),
    (matches_permission, build_permission),
    (matches_connection, build_connection),
];

/// Derive ordered remediation guidance from the failed check messages.
#[must_use]
pub fn synthesize(criteria_type: CriteriaType, failures: &[String]) -> Vec<String> {
    let input = SynthesisInput {
        criteria_type,
        failures,
        combined: failures.join("\n").to_lowercase(),
    };

    for (matches, build) in CATEGORIES {
        if matches(&input.combined) {
            return build(&input);
        }
    }
    generic(criteria_type)
}

/// Fixed guidance for the cluster-unavailable gating short-circuit.
#[must_use]
pub fn cluster_unavailable() -> Vec<String> {
    vec![
        "Start your cluster (e.g. minikube start, kind create cluster, or enable Kubernetes in Docker Desktop)".to_string(),
        "Check connectivity with: kubectl cluster-info".to_string(),
        "Confirm the active context with: kubectl config current-context".to_string(),
    ]
}

/// Fixed guidance for the container-runtime-unavailable gating short-circuit.
#[must_use]
pub fn container_runtime_unavailable() -> Vec<String> {
    vec![
        "Start the Docker daemon (open Docker Desktop, or: sudo systemctl start docker)".to_string(),
        "Verify the daemon responds with: docker version".to_string(),
        "Check that your user can reach the daemon socket with: docker info".to_string(),
    ]
}

/// Fallback block when no failure pattern is recognized.
#[must_use]
pub fn generic(criteria_type: CriteriaType) -> Vec<String> {
    let mut out = vec![
        "Review the error details above and compare them with the exercise instructions".to_string(),
        "Check that earlier steps of this exercise completed successfully".to_string(),
    ];
    match criteria_type {
        CriteriaType::Cluster => {
            out.push("Inspect recent cluster events with: kubectl get events --sort-by=.lastTimestamp".to_string());
        }
        CriteriaType::Container => {
            out.push("List your local images with: docker images".to_string());
        }
        CriteriaType::Http | CriteriaType::Custom => {}
    }
    out.push("Fix the issue and run the validation again".to_string());
    out
}

fn matches_not_found(text: &str) -> bool {
    text.contains("not found") || text.contains("notfound") || text.contains("no such")
}

fn matches_pending(text: &str) -> bool {
    text.contains("pending")
}

fn matches_image_pull(text: &str) -> bool {
    text.contains("imagepullbackoff")
        || text.contains("errimagepull")
        || text.contains("pull access denied")
        || text.contains("manifest unknown")
}

fn matches_crash_loop(text: &str) -> bool {
    text.contains("crashloopbackoff") || text.contains("back-off restarting")
}

fn matches_permission(text: &str) -> bool {
    text.contains("permission denied")
        || text.contains("forbidden")
        || text.contains("unauthorized")
        || text.contains("access denied")
}

fn matches_connection(text: &str) -> bool {
    text.contains("connection refused")
        || text.contains("connection reset")
        || text.contains("timed out")
        || text.contains("timeout")
        || text.contains("no route to host")
}

struct KubectlTarget {
    kind: String,
    name: String,
    namespace: Option<String>,
}

fn extract_kubectl_target(failures: &[String]) -> Option<KubectlTarget> {
    failures.iter().find_map(|message| {
        let caps = KUBECTL_TARGET.captures(message)?;
        Some(KubectlTarget {
            kind: caps["kind"].to_string(),
            name: caps["name"].to_string(),
            namespace: caps.name("ns").map(|m| m.as_str().to_string()),
        })
    })
}

fn build_not_found(input: &SynthesisInput<'_>) -> Vec<String> {
    let mut out = vec![
        "A resource the exercise expects was not found".to_string(),
        "Likely causes: it has not been created yet, it lives in a different namespace, or its name does not match the instructions".to_string(),
    ];

    if input.criteria_type == CriteriaType::Cluster {
        if let Some(target) = extract_kubectl_target(input.failures) {
            let ns_flag = target
                .namespace
                .as_deref()
                .map(|ns| format!(" -n {ns}"))
                .unwrap_or_default();
            out.push(format!(
                "Create the {} as described in the step, for example: kubectl create {} {}{ns_flag}",
                target.kind, target.kind, target.name
            ));
            out.push(format!(
                "Verify it exists with: kubectl get {} {}{ns_flag}",
                target.kind, target.name
            ));
        } else {
            out.push("Create the resource described in the exercise step, then validate again".to_string());
            out.push("Verify it exists with: kubectl get <kind> <name> -n <namespace>".to_string());
        }
    } else if input.criteria_type == CriteriaType::Container {
        out.push("Build or pull the image the step asks for, e.g.: docker build -t <tag> .".to_string());
        out.push("Verify it exists with: docker images".to_string());
    } else {
        out.push("Create whatever the step asks for, then validate again".to_string());
    }

    out
}

fn build_pending(_input: &SynthesisInput<'_>) -> Vec<String> {
    vec![
        "A pod or claim is stuck in Pending".to_string(),
        "Likely causes: insufficient cluster resources, an unbound PersistentVolumeClaim, or no schedulable node".to_string(),
        "Inspect the scheduling events with: kubectl describe pod <pod> -n <namespace>".to_string(),
        "Check claim binding with: kubectl get pvc -n <namespace>".to_string(),
        "Check recent events with: kubectl get events --sort-by=.lastTimestamp -n <namespace>".to_string(),
    ]
}

fn build_image_pull(_input: &SynthesisInput<'_>) -> Vec<String> {
    vec![
        "The cluster cannot pull a container image".to_string(),
        "Likely causes: a misspelled image name or tag, a private registry without imagePullSecrets, or the image was never pushed".to_string(),
        "See the exact pull error with: kubectl describe pod <pod> -n <namespace>".to_string(),
        "Confirm the image exists locally with: docker images, or try: docker pull <image>".to_string(),
        "For local clusters, load the image into the cluster (e.g. kind load docker-image <image>)".to_string(),
    ]
}

fn build_crash_loop(_input: &SynthesisInput<'_>) -> Vec<String> {
    vec![
        "A container is crash-looping".to_string(),
        "Likely causes: a missing ConfigMap or Secret, a wrong command or argument, or failing probes".to_string(),
        "Read the previous crash's logs with: kubectl logs <pod> -n <namespace> --previous".to_string(),
        "Check events and mounts with: kubectl describe pod <pod> -n <namespace>".to_string(),
    ]
}

fn build_permission(_input: &SynthesisInput<'_>) -> Vec<String> {
    vec![
        "The request was rejected for lack of permissions".to_string(),
        "Likely causes: the active context points at the wrong cluster or user, or RBAC denies the verb".to_string(),
        "Check the active context with: kubectl config current-context".to_string(),
        "Check the specific permission with: kubectl auth can-i <verb> <resource> -n <namespace>".to_string(),
    ]
}

fn build_connection(input: &SynthesisInput<'_>) -> Vec<String> {
    let mut out = vec![
        "A connection could not be established or timed out".to_string(),
    ];
    match input.criteria_type {
        CriteriaType::Cluster => {
            out.push("Check that the cluster is running with: kubectl cluster-info".to_string());
            out.push("If the cluster was restarted, availability may be stale - retry the validation".to_string());
        }
        CriteriaType::Container => {
            out.push("Check that the Docker daemon is running with: docker version".to_string());
        }
        CriteriaType::Http | CriteriaType::Custom => {
            out.push("Check that the service is running and listening on the expected port".to_string());
            out.push("If the service runs in the cluster, confirm the port-forward or NodePort from the step is still active".to_string());
        }
    }
    out.push("Retry once the endpoint responds".to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_wins_over_connection_when_both_match() {
        let failures = vec![
            "Command failed: kubectl get deployment web -n shop - Error from server (NotFound): deployments.apps \"web\" not found".to_string(),
            "Expected HTTP 200 from http://localhost:8080, got error: connection refused".to_string(),
        ];
        let suggestions = synthesize(CriteriaType::Cluster, &failures);
        assert!(suggestions[0].contains("not found"), "got: {suggestions:?}");
    }

    #[test]
    fn not_found_extracts_the_kubectl_target() {
        let failures = vec![
            "Command failed: kubectl get configmap app-config -n shop - Error from server (NotFound)".to_string(),
        ];
        let suggestions = synthesize(CriteriaType::Cluster, &failures);
        let joined = suggestions.join("\n");
        assert!(joined.contains("kubectl create configmap app-config -n shop"));
        assert!(joined.contains("kubectl get configmap app-config -n shop"));
    }

    #[test]
    fn not_found_without_namespace_omits_the_flag() {
        let failures =
            vec!["Command failed: kubectl get namespace training - not found".to_string()];
        let suggestions = synthesize(CriteriaType::Cluster, &failures);
        let joined = suggestions.join("\n");
        assert!(joined.contains("kubectl get namespace training"));
        assert!(!joined.contains("-n "), "got: {joined}");
    }

    #[test]
    fn unextractable_not_found_falls_back_to_generic_creation_guidance() {
        let failures = vec!["Custom check failed: resource not found".to_string()];
        let suggestions = synthesize(CriteriaType::Cluster, &failures);
        assert!(suggestions.iter().any(|s| s.contains("<kind> <name>")));
    }

    #[test]
    fn image_pull_failures_get_registry_guidance() {
        let failures = vec!["FAILED: pod web-abc is in ImagePullBackOff".to_string()];
        let suggestions = synthesize(CriteriaType::Cluster, &failures);
        assert!(suggestions.iter().any(|s| s.contains("docker pull")));
    }

    #[test]
    fn crash_loop_failures_point_at_previous_logs() {
        let failures = vec!["FAILED: pod web-abc is in CrashLoopBackOff".to_string()];
        let suggestions = synthesize(CriteriaType::Cluster, &failures);
        assert!(suggestions.iter().any(|s| s.contains("--previous")));
    }

    #[test]
    fn permission_failures_point_at_rbac() {
        let failures = vec![
            "Command failed: kubectl get secrets - Error from server (Forbidden)".to_string(),
        ];
        let suggestions = synthesize(CriteriaType::Cluster, &failures);
        assert!(suggestions.iter().any(|s| s.contains("auth can-i")));
    }

    #[test]
    fn connection_guidance_tracks_the_criteria_type() {
        let failures = vec!["HTTP request failed: connection refused".to_string()];

        let cluster = synthesize(CriteriaType::Cluster, &failures);
        assert!(cluster.iter().any(|s| s.contains("kubectl cluster-info")));

        let container = synthesize(CriteriaType::Container, &failures);
        assert!(container.iter().any(|s| s.contains("docker version")));

        let http = synthesize(CriteriaType::Http, &failures);
        assert!(http.iter().any(|s| s.contains("port")));
    }

    #[test]
    fn unrecognized_failures_still_produce_guidance() {
        let failures = vec!["something completely novel happened".to_string()];
        for criteria_type in [
            CriteriaType::Cluster,
            CriteriaType::Container,
            CriteriaType::Http,
            CriteriaType::Custom,
        ] {
            assert!(!synthesize(criteria_type, &failures).is_empty());
        }
        assert!(!synthesize(CriteriaType::Cluster, &[]).is_empty());
    }

    #[test]
    fn gating_suggestion_blocks_are_fixed_and_non_empty() {
        assert!(!cluster_unavailable().is_empty());
        assert!(!container_runtime_unavailable().is_empty());
    }
}
