//! Container engine for building and running challenge images

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::process::{ExecResult, ToolCommand};
use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::Docker;
use std::path::Path;
use tracing::{debug, info};

/// Environment passed to a compose invocation, in insertion order.
pub type ComposeEnv = Vec<(String, String)>;

/// Image and compose-stack operations
///
/// Compose calls return the tool's captured output whatever the exit status;
/// callers decide which failure kind a non-zero exit maps to.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Whether an image with this exact name exists locally.
    async fn image_exists(&self, image: &str) -> OrchestratorResult<bool>;

    /// Build the compose project in `project_dir` without cache.
    async fn compose_build(&self, project_dir: &Path, env: &ComposeEnv)
        -> OrchestratorResult<ExecResult>;

    /// Start the compose project detached.
    async fn compose_up(&self, project_dir: &Path, env: &ComposeEnv)
        -> OrchestratorResult<ExecResult>;

    /// Stop and remove the compose project.
    async fn compose_down(&self, project_dir: &Path, env: &ComposeEnv)
        -> OrchestratorResult<ExecResult>;
}

/// Docker daemon plus the `docker compose` plugin
pub struct DockerEngine {
    docker: Docker,
    cli: String,
}

impl DockerEngine {
    /// Connect to the local daemon and verify it answers.
    pub async fn new() -> OrchestratorResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            OrchestratorError::EngineUnavailable(format!("Failed to connect to Docker: {}", e))
        })?;

        // Verify connection
        docker.ping().await.map_err(|e| {
            OrchestratorError::EngineUnavailable(format!("Failed to ping Docker: {}", e))
        })?;

        info!("Connected to Docker daemon");
        Ok(Self {
            docker,
            cli: "docker".to_string(),
        })
    }

    async fn compose(
        &self,
        project_dir: &Path,
        env: &ComposeEnv,
        args: &[&str],
    ) -> OrchestratorResult<ExecResult> {
        let mut cmd = ToolCommand::new(&self.cli)
            .arg("compose")
            .args(args)
            .current_dir(project_dir);
        for (key, value) in env {
            cmd = cmd.env(key, value);
        }

        let result = cmd.run().await?;
        debug!(
            "docker compose {} exited with {} in {}ms",
            args.join(" "),
            result.exit_code,
            result.duration_ms
        );
        Ok(result)
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn image_exists(&self, image: &str) -> OrchestratorResult<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                debug!("Image {} already exists", image);
                Ok(true)
            }
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(OrchestratorError::EngineUnavailable(format!(
                "Failed to inspect image {}: {}",
                image, e
            ))),
        }
    }

    async fn compose_build(
        &self,
        project_dir: &Path,
        env: &ComposeEnv,
    ) -> OrchestratorResult<ExecResult> {
        self.compose(project_dir, env, &["build", "--no-cache"]).await
    }

    async fn compose_up(
        &self,
        project_dir: &Path,
        env: &ComposeEnv,
    ) -> OrchestratorResult<ExecResult> {
        self.compose(project_dir, env, &["up", "-d"]).await
    }

    async fn compose_down(
        &self,
        project_dir: &Path,
        env: &ComposeEnv,
    ) -> OrchestratorResult<ExecResult> {
        self.compose(project_dir, env, &["down"]).await
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}
