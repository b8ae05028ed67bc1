//! Runner launch and teardown
//!
//! The runner image receives its launch arguments through a single `ARGS`
//! environment variable. The contract is five positional arguments, each
//! wrapped in double quotes:
//!
//! ```text
//! "<target repo>" "<startup command | None>" "<callback url>" "<task id>" "<secret>"
//! ```
//!
//! When no startup command is given the literal `None` is passed and the
//! image falls back to its own default.

use crate::docker::{ComposeEnv, ContainerEngine};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::image::{ARGS_ENV, IMAGE_NAME_ENV};
use crate::repository::{ImageHandle, RepositoryAddress};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Startup command sentinel meaning "use the image default".
pub const UNSPECIFIED_STARTUP_COMMAND: &str = "None";

/// Arguments handed to a launched runner
#[derive(Clone)]
pub struct LaunchArguments {
    /// Solution repository, possibly with embedded credentials.
    pub target_repo: RepositoryAddress,
    pub startup_command: Option<String>,
    pub callback_url: String,
    pub task_id: String,
    pub secret: String,
}

impl LaunchArguments {
    /// The five arguments in contract order.
    pub fn to_vec(&self) -> Vec<String> {
        vec![
            self.target_repo.as_str().to_string(),
            self.startup_command
                .clone()
                .filter(|cmd| !cmd.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_STARTUP_COMMAND.to_string()),
            self.callback_url.clone(),
            self.task_id.clone(),
            self.secret.clone(),
        ]
    }

    /// Quoted, space-joined form for the `ARGS` variable.
    pub fn to_env_value(&self) -> String {
        self.to_vec()
            .iter()
            .map(|arg| quote_argument(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for LaunchArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchArguments")
            .field("target_repo", &self.target_repo)
            .field("startup_command", &self.startup_command)
            .field("callback_url", &self.callback_url)
            .field("task_id", &self.task_id)
            .field("secret", &"***")
            .finish()
    }
}

/// Double-quote an argument, escaping characters that are special inside
/// double quotes so the argument boundary survives embedded spaces.
pub fn quote_argument(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Starts and stops the runner compose stack
#[derive(Clone)]
pub struct RunnerLauncher {
    engine: Arc<dyn ContainerEngine>,
}

impl RunnerLauncher {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    pub fn launch_env(image: &ImageHandle, args: &LaunchArguments) -> ComposeEnv {
        vec![
            (IMAGE_NAME_ENV.to_string(), image.as_str().to_string()),
            (ARGS_ENV.to_string(), args.to_env_value()),
        ]
    }

    /// Start the stack detached. Returns once the engine accepted it; the
    /// runner is not known to be ready until it calls back.
    pub async fn launch(
        &self,
        context_dir: &Path,
        image: &ImageHandle,
        args: &LaunchArguments,
    ) -> OrchestratorResult<()> {
        info!("Launching runner {} (task {})", image, args.task_id);
        let result = self
            .engine
            .compose_up(context_dir, &Self::launch_env(image, args))
            .await?;
        if !result.success() {
            return Err(OrchestratorError::LaunchFailed {
                image: image.to_string(),
                output: result.output(),
            });
        }
        Ok(())
    }

    pub async fn teardown(&self, context_dir: &Path, image: &ImageHandle) -> OrchestratorResult<()> {
        info!("Stopping runner {}", image);
        let env = vec![(IMAGE_NAME_ENV.to_string(), image.as_str().to_string())];
        let result = self.engine.compose_down(context_dir, &env).await?;
        if !result.success() {
            return Err(OrchestratorError::TeardownFailed {
                image: image.to_string(),
                output: result.output(),
            });
        }
        Ok(())
    }
}
