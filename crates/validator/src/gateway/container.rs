//! Docker daemon gateway driven through the `docker` CLI.
//!
//! The daemon is reached the same way the training material has learners
//! reach it: the `docker` binary. Machine-readable output comes from
//! `--format` JSON templates, and daemon-connection failures are recognized
//! from the CLI's stderr.

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::ContainerOps;
use crate::error::GatewayError;

/// Locally stored image metadata.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub id: String,
    pub tags: Vec<String>,
    pub size_bytes: u64,
    pub created: Option<DateTime<Utc>>,
}

/// Outcome of an image build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub success: bool,
    pub image_id: Option<String>,
    /// Build log, one entry per line, stdout then stderr.
    pub output: Vec<String>,
}

/// `docker image inspect` JSON entry, reduced to the fields the engine uses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedImage {
    id: String,
    #[serde(default)]
    repo_tags: Vec<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    created: String,
}

impl From<InspectedImage> for ImageInfo {
    fn from(raw: InspectedImage) -> Self {
        Self {
            id: raw.id,
            tags: raw.repo_tags,
            size_bytes: raw.size,
            created: raw.created.parse::<DateTime<Utc>>().ok(),
        }
    }
}

/// Thin wrapper over the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCliGateway {
    binary: String,
}

impl Default for DockerCliGateway {
    fn default() -> Self {
        Self {
            binary: std::env::var("VALIDATOR_DOCKER_BIN").unwrap_or_else(|_| "docker".to_string()),
        }
    }
}

impl DockerCliGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, GatewayError> {
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|err| GatewayError::Unreachable(format!("failed to run {}: {err}", self.binary)))
    }

    /// Map CLI stderr onto the closed gateway error set.
    fn classify_stderr(stderr: &str) -> GatewayError {
        let lower = stderr.to_lowercase();
        if lower.contains("cannot connect to the docker daemon")
            || lower.contains("is the docker daemon running")
            || lower.contains("dial unix")
            || lower.contains("connection refused")
            || lower.contains("i/o timeout")
        {
            GatewayError::Unreachable(stderr.trim().to_string())
        } else if lower.contains("no such image") || lower.contains("no such object") {
            GatewayError::NotFound(stderr.trim().to_string())
        } else if lower.contains("permission denied") {
            GatewayError::Forbidden(stderr.trim().to_string())
        } else {
            GatewayError::Other(stderr.trim().to_string())
        }
    }

    fn parse_inspect_output(stdout: &str) -> Result<Vec<ImageInfo>, GatewayError> {
        let images: Vec<InspectedImage> = serde_json::from_str(stdout)
            .map_err(|err| GatewayError::Other(format!("unparsable inspect output: {err}")))?;
        Ok(images.into_iter().map(ImageInfo::from).collect())
    }
}

#[async_trait]
impl ContainerOps for DockerCliGateway {
    #[instrument(skip(self))]
    async fn is_available(&self) -> bool {
        match self
            .run(&["version", "--format", "{{.Server.Version}}"])
            .await
        {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                debug!(
                    "docker availability probe failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(err) => {
                debug!("docker availability probe failed: {err}");
                false
            }
        }
    }

    #[instrument(skip(self), fields(tag = %tag))]
    async fn build_image(
        &self,
        context_dir: &Path,
        dockerfile: &Path,
        tag: &str,
    ) -> Result<BuildResult, GatewayError> {
        let output = Command::new(&self.binary)
            .arg("build")
            .arg("-f")
            .arg(dockerfile)
            .arg("-t")
            .arg(tag)
            .arg(context_dir)
            .output()
            .await
            .map_err(|err| GatewayError::Unreachable(format!("failed to run {}: {err}", self.binary)))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let mut log: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(ToString::to_string)
            .collect();
        log.extend(stderr.lines().map(ToString::to_string));

        if !output.status.success() {
            let classified = Self::classify_stderr(&stderr);
            if classified.is_transient() {
                return Err(classified);
            }
            // A genuine build failure (bad Dockerfile, missing context file)
            // is a result, not a gateway error.
            return Ok(BuildResult {
                success: false,
                image_id: None,
                output: log,
            });
        }

        let image_id = self.get_image(tag).await?.map(|image| image.id);
        Ok(BuildResult {
            success: true,
            image_id,
            output: log,
        })
    }

    #[instrument(skip(self), fields(reference = %reference))]
    async fn get_image(&self, reference: &str) -> Result<Option<ImageInfo>, GatewayError> {
        let output = self.run(&["image", "inspect", reference]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return match Self::classify_stderr(&stderr) {
                GatewayError::NotFound(_) => Ok(None),
                other => Err(other),
            };
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Self::parse_inspect_output(&stdout)?.into_iter().next())
    }

    #[instrument(skip(self), fields(filter = ?reference_filter))]
    async fn list_images<'a>(
        &self,
        reference_filter: Option<&'a str>,
    ) -> Result<Vec<ImageInfo>, GatewayError> {
        let mut args = vec!["images", "-q", "--no-trunc"];
        if let Some(filter) = reference_filter {
            args.push(filter);
        }
        let output = self.run(&args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_stderr(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut ids: Vec<&str> = Vec::new();
        for id in stdout.lines().map(str::trim).filter(|id| !id.is_empty()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut inspect_args = vec!["image", "inspect"];
        inspect_args.extend(ids.iter().copied());
        let output = self.run(&inspect_args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_stderr(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_inspect_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_connection_stderr_is_unreachable() {
        let err = DockerCliGateway::classify_stderr(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
        );
        assert!(matches!(err, GatewayError::Unreachable(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn missing_image_stderr_is_not_found() {
        let err = DockerCliGateway::classify_stderr(
            "Error response from daemon: No such image: kubedojo/web:v1",
        );
        assert!(matches!(err, GatewayError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn parses_inspect_json() {
        let stdout = r#"[
            {
                "Id": "sha256:0af6ee2cfd01a0e4a1a443b35dbbbb17eb83f42e31fca9a13bebdbfc42a23efe",
                "RepoTags": ["kubedojo/web:v1", "kubedojo/web:latest"],
                "Size": 133277153,
                "Created": "2026-02-11T08:15:40.junk"
            }
        ]"#;

        // A malformed timestamp degrades to None rather than failing the call.
        let images = DockerCliGateway::parse_inspect_output(stdout).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].tags.len(), 2);
        assert_eq!(images[0].size_bytes, 133_277_153);
        assert!(images[0].created.is_none());
    }

    #[test]
    fn parses_valid_created_timestamp() {
        let stdout = r#"[{"Id": "sha256:abc", "RepoTags": [], "Size": 10, "Created": "2026-02-11T08:15:40Z"}]"#;
        let images = DockerCliGateway::parse_inspect_output(stdout).unwrap();
        assert!(images[0].created.is_some());
    }

    #[test]
    fn garbage_inspect_output_is_an_error() {
        assert!(DockerCliGateway::parse_inspect_output("not json").is_err());
    }
}
