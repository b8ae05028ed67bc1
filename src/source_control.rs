//! Source-control capability
//!
//! The orchestrator only needs three things from source control: whether a
//! remote exists, what its HEAD commit is, and a full checkout of it.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::process::ToolCommand;
use crate::repository::RepositoryAddress;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Remote repository operations
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Whether the remote can be listed. Any failure reads as "does not exist".
    async fn repo_exists(&self, address: &RepositoryAddress) -> bool;

    /// Full commit id of the remote HEAD.
    async fn resolve_head(&self, address: &RepositoryAddress) -> OrchestratorResult<String>;

    /// Clone `address` into `destination` (which may exist but must be empty).
    async fn clone_repo(
        &self,
        address: &RepositoryAddress,
        destination: &Path,
    ) -> OrchestratorResult<()>;
}

/// `git` command-line implementation
#[derive(Clone, Debug)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Use a specific git binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> ToolCommand<'_> {
        // Never block on an interactive credential prompt.
        ToolCommand::new(&self.program).env("GIT_TERMINAL_PROMPT", "0")
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn repo_exists(&self, address: &RepositoryAddress) -> bool {
        match self
            .command()
            .args(&["ls-remote", "--", address.as_str()])
            .run()
            .await
        {
            Ok(result) => result.success(),
            Err(e) => {
                debug!("Existence check for {} failed: {}", address, e);
                false
            }
        }
    }

    async fn resolve_head(&self, address: &RepositoryAddress) -> OrchestratorResult<String> {
        let unreachable = |detail: String| OrchestratorError::RemoteUnreachable {
            address: address.redacted(),
            detail,
        };

        let result = self
            .command()
            .args(&["ls-remote", "--", address.as_str(), "HEAD"])
            .run()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        if !result.success() {
            return Err(unreachable(result.stderr.trim().to_string()));
        }

        parse_head_commit(&result.stdout)
            .ok_or_else(|| unreachable("remote did not report a HEAD reference".to_string()))
    }

    async fn clone_repo(
        &self,
        address: &RepositoryAddress,
        destination: &Path,
    ) -> OrchestratorResult<()> {
        let destination_str = destination.to_string_lossy().into_owned();
        info!("Cloning {} into {}", address, destination.display());

        let result = self
            .command()
            .args(&["clone", "--", address.as_str(), destination_str.as_str()])
            .run()
            .await?;

        if !result.success() {
            return Err(OrchestratorError::CloneFailed {
                address: address.redacted(),
                detail: result.output().trim().to_string(),
            });
        }
        Ok(())
    }
}

/// First field of the first `ls-remote` line: `<commit>\tHEAD`.
fn parse_head_commit(output: &str) -> Option<String> {
    output
        .lines()
        .next()
        .and_then(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|commit| !commit.is_empty())
        .map(str::to_string)
}
