//! Local workspace allocation and runtime provisioning

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::process::ToolCommand;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Subdirectory the solution repository is cloned into.
pub const SOLUTION_DIR: &str = "app";

/// Subdirectory holding the isolated runtime environment.
pub const RUNTIME_DIR: &str = "venv";

/// Dependency manifest inside the support library.
pub const REQUIREMENTS_PATH: &str = "build/requirements.txt";

/// Create the first free directory among `name`, `name-1`, `name-2`, ...
/// under `root`.
///
/// Creation itself is the check, so a directory that appears between two
/// probes is skipped rather than reused.
pub fn allocate_workspace(
    root: &Path,
    name: &str,
    max_probes: Option<u32>,
) -> OrchestratorResult<PathBuf> {
    std::fs::create_dir_all(root).map_err(|e| OrchestratorError::filesystem(root, e))?;

    let mut attempt: u32 = 0;
    loop {
        if let Some(max) = max_probes {
            if attempt >= max {
                return Err(OrchestratorError::WorkspaceAllocationExhausted {
                    name: name.to_string(),
                    attempts: attempt,
                });
            }
        }

        let candidate = if attempt == 0 {
            root.join(name)
        } else {
            root.join(format!("{}-{}", name, attempt))
        };

        match std::fs::create_dir(&candidate) {
            Ok(()) => {
                info!("Allocated workspace {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{} is taken", candidate.display());
            }
            Err(e) => return Err(OrchestratorError::filesystem(&candidate, e)),
        }

        attempt = attempt.checked_add(1).ok_or_else(|| {
            OrchestratorError::WorkspaceAllocationExhausted {
                name: name.to_string(),
                attempts: u32::MAX,
            }
        })?;
    }
}

/// Isolated language runtime for a workspace
#[async_trait]
pub trait RuntimeProvisioner: Send + Sync {
    /// Create the environment at `env_dir`.
    async fn create_environment(&self, env_dir: &Path) -> OrchestratorResult<()>;

    /// Install `requirements` into the environment at `env_dir`.
    async fn install_requirements(&self, env_dir: &Path, requirements: &Path)
        -> OrchestratorResult<()>;
}

/// Python virtual environment provisioned with `python3 -m venv` and pip
#[derive(Clone, Debug)]
pub struct PythonVenv {
    python: String,
}

impl PythonVenv {
    pub fn new() -> Self {
        Self {
            python: "python3".to_string(),
        }
    }

    pub fn with_interpreter(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn env_python(env_dir: &Path) -> PathBuf {
        env_dir.join("bin").join("python3")
    }
}

impl Default for PythonVenv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeProvisioner for PythonVenv {
    async fn create_environment(&self, env_dir: &Path) -> OrchestratorResult<()> {
        let env_dir_str = env_dir.to_string_lossy().into_owned();
        info!("Creating virtual environment at {}", env_dir.display());

        let result = ToolCommand::new(&self.python)
            .args(&["-m", "venv", env_dir_str.as_str()])
            .run()
            .await?;
        if !result.success() {
            return Err(OrchestratorError::ProvisionFailed(format!(
                "venv creation at {} failed:\n{}",
                env_dir.display(),
                result.output()
            )));
        }
        Ok(())
    }

    async fn install_requirements(
        &self,
        env_dir: &Path,
        requirements: &Path,
    ) -> OrchestratorResult<()> {
        let python = Self::env_python(env_dir).to_string_lossy().into_owned();
        let requirements_str = requirements.to_string_lossy().into_owned();
        info!("Installing {}", requirements.display());

        let result = ToolCommand::new(&python)
            .args(&["-m", "pip", "install", "-r", requirements_str.as_str()])
            .run()
            .await?;
        if !result.success() {
            return Err(OrchestratorError::ProvisionFailed(format!(
                "pip install -r {} failed:\n{}",
                requirements.display(),
                result.output()
            )));
        }
        Ok(())
    }
}
