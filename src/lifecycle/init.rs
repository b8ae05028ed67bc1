//! Initialize flow: an editable local copy of a challenge and a solution

use super::{check_existence, notify, AbortReason, InitPhase, PhaseObserver};
use crate::build_context::{copy_tree, SUPPORT_LIBRARY_DIR};
use crate::config::RunnerSettings;
use crate::error::OrchestratorResult;
use crate::repository::{ChallengeId, RepositoryAddress};
use crate::source_control::SourceControl;
use crate::workspace::{
    allocate_workspace, RuntimeProvisioner, REQUIREMENTS_PATH, RUNTIME_DIR, SOLUTION_DIR,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct InitRequest {
    pub challenge: ChallengeId,
    pub solution_repo: RepositoryAddress,
    pub credential: Option<String>,
}

/// A populated workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceReport {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum InitOutcome {
    Initialized(WorkspaceReport),
    Aborted(AbortReason),
}

pub struct WorkspaceInitializer {
    settings: RunnerSettings,
    source_control: Arc<dyn SourceControl>,
    provisioner: Arc<dyn RuntimeProvisioner>,
    observer: Option<PhaseObserver<InitPhase>>,
}

impl WorkspaceInitializer {
    pub fn new(
        settings: RunnerSettings,
        source_control: Arc<dyn SourceControl>,
        provisioner: Arc<dyn RuntimeProvisioner>,
    ) -> Self {
        Self {
            settings,
            source_control,
            provisioner,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: impl Fn(InitPhase) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Create `{challenge}[-N]/` holding the challenge clone, the solution
    /// under `app/`, the support library under `fs_lib/` and a runtime under
    /// `venv/`. Nothing is rolled back on failure.
    #[instrument(skip(self, request), fields(challenge = %request.challenge))]
    pub async fn initialize(&self, request: &InitRequest) -> OrchestratorResult<InitOutcome> {
        let challenge = &request.challenge;
        let solution_repo = request
            .solution_repo
            .with_credential(request.credential.as_deref());

        self.enter(InitPhase::CheckingExistence);
        if let Some(reason) =
            check_existence(self.source_control.as_ref(), challenge, &solution_repo).await
        {
            warn!("{}", reason);
            self.enter(InitPhase::Aborted);
            return Ok(InitOutcome::Aborted(reason));
        }

        self.enter(InitPhase::AllocatingWorkspace);
        let workspace = allocate_workspace(
            &self.settings.workspace_root,
            challenge.as_str(),
            self.settings.max_workspace_probes,
        )?;

        self.enter(InitPhase::CloningBoth);
        self.source_control
            .clone_repo(&challenge.repository(), &workspace)
            .await?;
        self.source_control
            .clone_repo(&solution_repo, &workspace.join(SOLUTION_DIR))
            .await?;

        self.enter(InitPhase::InjectingLibrary);
        let library = workspace.join(SUPPORT_LIBRARY_DIR);
        copy_tree(&self.settings.support_library, &library)?;

        self.enter(InitPhase::PreparingRuntime);
        let env_dir = workspace.join(RUNTIME_DIR);
        self.provisioner.create_environment(&env_dir).await?;
        self.provisioner
            .install_requirements(&env_dir, &library.join(REQUIREMENTS_PATH))
            .await?;

        self.enter(InitPhase::Done);
        info!("Workspace ready at {}", workspace.display());
        Ok(InitOutcome::Initialized(WorkspaceReport { path: workspace }))
    }

    fn enter(&self, phase: InitPhase) {
        info!(phase = ?phase, "{}", phase);
        notify(&self.observer, phase);
    }
}
