//! Challenge lifecycle controller
//!
//! Two independent flows:
//!
//! Run:  Resolving -> Gating -> (Assembling -> Building)? -> Launching ->
//!       AwaitingResult -> Reporting -> TearingDown -> Done
//!
//! Init: CheckingExistence -> AllocatingWorkspace -> CloningBoth ->
//!       InjectingLibrary -> PreparingRuntime -> Done
//!
//! Both abort cleanly, before any side effect, when neither the challenge
//! nor the solution repository exists. Every other failure is returned as an
//! error and leaves whatever was created on disk or running.

mod init;
mod run;

pub use init::{InitOutcome, InitRequest, WorkspaceInitializer, WorkspaceReport};
pub use run::{Orchestrator, RunOutcome, RunReport, RunRequest};

use crate::repository::{ChallengeId, RepositoryAddress};
use crate::source_control::SourceControl;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Callback invoked on every phase transition.
pub type PhaseObserver<P> = Arc<dyn Fn(P) + Send + Sync>;

/// States of the run flow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Resolving,
    Gating,
    Assembling,
    Building,
    Launching,
    AwaitingResult,
    Reporting,
    TearingDown,
    Done,
    Aborted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Resolving => "Resolving challenge version",
            Self::Gating => "Checking for an up-to-date image",
            Self::Assembling => "Assembling build context",
            Self::Building => "Building challenge image",
            Self::Launching => "Launching challenge runner",
            Self::AwaitingResult => "Waiting for runner results",
            Self::Reporting => "Reporting results",
            Self::TearingDown => "Stopping challenge runner",
            Self::Done => "Done",
            Self::Aborted => "Aborted",
        };
        f.write_str(label)
    }
}

/// States of the initialize flow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitPhase {
    CheckingExistence,
    AllocatingWorkspace,
    CloningBoth,
    InjectingLibrary,
    PreparingRuntime,
    Done,
    Aborted,
}

impl fmt::Display for InitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CheckingExistence => "Checking repositories",
            Self::AllocatingWorkspace => "Allocating workspace",
            Self::CloningBoth => "Cloning challenge and solution",
            Self::InjectingLibrary => "Copying support library",
            Self::PreparingRuntime => "Preparing runtime environment",
            Self::Done => "Done",
            Self::Aborted => "Aborted",
        };
        f.write_str(label)
    }
}

/// Why a flow stopped without doing anything
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// Neither repository could be found.
    RepoNotFound {
        challenge_repo: String,
        solution_repo: String,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepoNotFound {
                challenge_repo,
                solution_repo,
            } => write!(
                f,
                "User challenge repo or challenge does not exist ({} / {})",
                solution_repo, challenge_repo
            ),
        }
    }
}

/// Existence gate shared by both flows: at least one repository must exist.
async fn check_existence(
    source_control: &dyn SourceControl,
    challenge: &ChallengeId,
    solution: &RepositoryAddress,
) -> Option<AbortReason> {
    let challenge_repo = challenge.repository();
    if source_control.repo_exists(solution).await
        || source_control.repo_exists(&challenge_repo).await
    {
        return None;
    }
    Some(AbortReason::RepoNotFound {
        challenge_repo: challenge_repo.redacted(),
        solution_repo: solution.redacted(),
    })
}

fn notify<P: Copy>(observer: &Option<PhaseObserver<P>>, phase: P) {
    if let Some(observer) = observer {
        observer(phase);
    }
}
