//! Build context assembly
//!
//! A build context is `<root>/<challenge>/`: a fresh clone of the challenge
//! definition with the support library copied into `fs_lib/`. It is never
//! updated in place; every assembly deletes and recreates it.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::repository::ChallengeId;
use crate::source_control::SourceControl;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Subdirectory the support library is copied into.
pub const SUPPORT_LIBRARY_DIR: &str = "fs_lib";

/// Produces clean build contexts for challenges
#[derive(Clone)]
pub struct BuildContextAssembler {
    root: PathBuf,
    support_library: PathBuf,
    source_control: Arc<dyn SourceControl>,
}

impl BuildContextAssembler {
    pub fn new(
        root: impl Into<PathBuf>,
        support_library: impl Into<PathBuf>,
        source_control: Arc<dyn SourceControl>,
    ) -> Self {
        Self {
            root: root.into(),
            support_library: support_library.into(),
            source_control,
        }
    }

    /// Directory of the build context for `challenge`.
    pub fn context_dir(&self, challenge: &ChallengeId) -> PathBuf {
        self.root.join(challenge.as_str())
    }

    /// Delete, recreate, clone and inject the support library.
    ///
    /// On failure whatever was written stays on disk; the next assembly
    /// starts from scratch anyway.
    pub async fn assemble(&self, challenge: &ChallengeId) -> OrchestratorResult<PathBuf> {
        let dir = self.context_dir(challenge);
        info!("Assembling build context for {} at {}", challenge, dir.display());

        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!("Removed previous build context {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(OrchestratorError::filesystem(&dir, e)),
        }
        std::fs::create_dir_all(&dir).map_err(|e| OrchestratorError::filesystem(&dir, e))?;

        self.source_control
            .clone_repo(&challenge.repository(), &dir)
            .await?;

        copy_tree(&self.support_library, &dir.join(SUPPORT_LIBRARY_DIR))?;
        Ok(dir)
    }
}

/// Recursively copy `source` to `destination`, following symlinks.
pub fn copy_tree(source: &Path, destination: &Path) -> OrchestratorResult<()> {
    if !source.is_dir() {
        return Err(OrchestratorError::filesystem(
            source,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            OrchestratorError::filesystem(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| OrchestratorError::filesystem(&target, e))?;
        } else {
            std::fs::copy(entry.path(), &target)
                .map_err(|e| OrchestratorError::filesystem(&target, e))?;
        }
    }
    Ok(())
}
