//! Init command - set up a local workspace for a challenge

use super::load_credential;
use crate::style::*;
use anyhow::{anyhow, Context, Result};
use challenge_runner::{
    ChallengeId, GitCli, InitOutcome, InitPhase, InitRequest, PythonVenv, RepositoryAddress,
    RunnerSettings, WorkspaceInitializer,
};
use std::sync::Arc;

const TOTAL_STEPS: u32 = 5;

fn step_number(phase: InitPhase) -> Option<u32> {
    match phase {
        InitPhase::CheckingExistence => Some(1),
        InitPhase::AllocatingWorkspace => Some(2),
        InitPhase::CloningBoth => Some(3),
        InitPhase::InjectingLibrary => Some(4),
        InitPhase::PreparingRuntime => Some(5),
        InitPhase::Done | InitPhase::Aborted => None,
    }
}

pub async fn run(settings: RunnerSettings, challenge: &str, repo: &str) -> Result<()> {
    let request = InitRequest {
        challenge: ChallengeId::parse(challenge)?,
        solution_repo: RepositoryAddress::parse(repo)?,
        credential: load_credential()?,
    };

    print_header(&format!("Initializing {}", request.challenge));

    let initializer = WorkspaceInitializer::new(
        settings,
        Arc::new(GitCli::new()),
        Arc::new(PythonVenv::new()),
    )
    .with_observer(|phase| {
        if let Some(step) = step_number(phase) {
            print_step(step, TOTAL_STEPS, &phase.to_string());
        }
    });

    match initializer
        .initialize(&request)
        .await
        .context("Workspace initialization failed")?
    {
        InitOutcome::Initialized(report) => {
            println!();
            print_success("Workspace ready");
            print_key_value("Path", &report.path.display().to_string());
            print_info(&format!(
                "Edit your solution in {}",
                style_bold(&report.path.join("app").display().to_string())
            ));
            println!("  {}", style_dim("Activate the environment with: source venv/bin/activate"));
            Ok(())
        }
        InitOutcome::Aborted(reason) => {
            print_warning(&reason.to_string());
            Err(anyhow!("Initialization aborted"))
        }
    }
}
