//! Challenge version resolution
//!
//! Nothing is cached: each call asks the remote again, so two resolutions of
//! the same challenge can differ if its HEAD moved in between.

use crate::error::OrchestratorResult;
use crate::repository::{ChallengeId, ImageHandle, RepositoryAddress, RevisionTag};
use crate::source_control::SourceControl;
use std::sync::Arc;
use tracing::debug;

/// Maps challenges to repositories and repositories to revision tags
#[derive(Clone)]
pub struct VersionResolver {
    source_control: Arc<dyn SourceControl>,
}

impl VersionResolver {
    pub fn new(source_control: Arc<dyn SourceControl>) -> Self {
        Self { source_control }
    }

    /// Repository of a challenge. Template substitution only, no network.
    pub fn challenge_repository(challenge: &ChallengeId) -> RepositoryAddress {
        challenge.repository()
    }

    /// Current revision tag of a remote.
    pub async fn resolve_revision(
        &self,
        address: &RepositoryAddress,
    ) -> OrchestratorResult<RevisionTag> {
        let commit = self.source_control.resolve_head(address).await?;
        let tag = RevisionTag::from_commit(&commit);
        debug!("Resolved {} to revision {}", address, tag);
        Ok(tag)
    }

    /// Image name for the challenge's current revision.
    pub async fn resolve_image(&self, challenge: &ChallengeId) -> OrchestratorResult<ImageHandle> {
        let tag = self
            .resolve_revision(&Self::challenge_repository(challenge))
            .await?;
        Ok(ImageHandle::new(challenge, &tag))
    }
}
