//! Challenge image cache gate and builder

use crate::docker::{ComposeEnv, ContainerEngine};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::repository::{ChallengeId, ImageHandle, RepositoryAddress};
use crate::version::VersionResolver;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Environment variable naming the image to build or run.
pub const IMAGE_NAME_ENV: &str = "IMAGE_NAME";
/// Environment variable carrying extra build args or runner launch arguments.
pub const ARGS_ENV: &str = "ARGS";
/// Environment variable carrying the serialized [`RunnerConfig`].
pub const RUNNER_CONFIG_ENV: &str = "RUNNER_CONFIG";

/// Build-time configuration consumed by the challenge image's own build logic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    pub challenge_repo: String,
    pub additional_packages: String,
}

impl RunnerConfig {
    pub fn new(challenge_repo: &RepositoryAddress) -> Self {
        Self {
            challenge_repo: challenge_repo.as_str().to_string(),
            additional_packages: String::new(),
        }
    }
}

/// Answers whether the image for a revision already exists locally.
///
/// The answer is advisory; whether it is acted on is up to the caller.
#[derive(Clone)]
pub struct ImageCacheGate {
    engine: Arc<dyn ContainerEngine>,
}

impl ImageCacheGate {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    pub async fn is_up_to_date(&self, image: &ImageHandle) -> OrchestratorResult<bool> {
        self.engine.image_exists(image.as_str()).await
    }

    /// Resolve the challenge's current revision and check its image.
    pub async fn check_challenge(
        &self,
        resolver: &VersionResolver,
        challenge: &ChallengeId,
    ) -> OrchestratorResult<(ImageHandle, bool)> {
        let image = resolver.resolve_image(challenge).await?;
        let up_to_date = self.is_up_to_date(&image).await?;
        Ok((image, up_to_date))
    }
}

/// Builds challenge images from an assembled build context
#[derive(Clone)]
pub struct ImageBuilder {
    engine: Arc<dyn ContainerEngine>,
}

impl ImageBuilder {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Environment handed to the build capability.
    pub fn build_env(
        image: &ImageHandle,
        challenge_repo: &RepositoryAddress,
    ) -> OrchestratorResult<ComposeEnv> {
        let runner_config = serde_json::to_string(&RunnerConfig::new(challenge_repo))?;
        Ok(vec![
            (IMAGE_NAME_ENV.to_string(), image.as_str().to_string()),
            // Reserved, always empty.
            (ARGS_ENV.to_string(), String::new()),
            (RUNNER_CONFIG_ENV.to_string(), runner_config),
        ])
    }

    #[instrument(skip(self, context_dir, challenge_repo), fields(image = %image))]
    pub async fn build(
        &self,
        context_dir: &Path,
        image: &ImageHandle,
        challenge_repo: &RepositoryAddress,
    ) -> OrchestratorResult<()> {
        let env = Self::build_env(image, challenge_repo)?;
        info!("Building challenge image {}", image);

        let result = self.engine.compose_build(context_dir, &env).await?;
        if !result.success() {
            return Err(OrchestratorError::BuildFailed {
                image: image.to_string(),
                output: result.output(),
            });
        }

        info!("Built {} in {:.1}s", image, result.duration_ms as f64 / 1000.0);
        Ok(())
    }
}
