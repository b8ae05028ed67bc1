//! Verify command - build the challenge image and run a solution against it

use super::load_credential;
use crate::style::*;
use anyhow::{anyhow, Context, Result};
use challenge_runner::{
    ChallengeId, DockerEngine, GitCli, Orchestrator, RepositoryAddress, RunOutcome, RunPhase,
    RunRequest, RunnerSettings,
};
use std::sync::Arc;

const TOTAL_STEPS: u32 = 8;

fn step_number(phase: RunPhase) -> Option<u32> {
    match phase {
        RunPhase::Resolving => Some(1),
        RunPhase::Gating => Some(2),
        RunPhase::Assembling => Some(3),
        RunPhase::Building => Some(4),
        RunPhase::Launching => Some(5),
        RunPhase::AwaitingResult => Some(6),
        RunPhase::Reporting => Some(7),
        RunPhase::TearingDown => Some(8),
        RunPhase::Done | RunPhase::Aborted => None,
    }
}

pub async fn run(
    settings: RunnerSettings,
    challenge: &str,
    repo: &str,
    startup_command: Option<String>,
) -> Result<()> {
    let challenge = ChallengeId::parse(challenge)?;
    let solution_repo = RepositoryAddress::parse(repo)?;

    let engine = DockerEngine::new()
        .await
        .context("Cannot connect to docker")?;

    print_header(&format!("Verifying {}", challenge));
    print_key_value("Solution", &solution_repo.to_string());
    print_key_value(
        "Startup command",
        startup_command.as_deref().unwrap_or("(image default)"),
    );
    println!();

    let request = RunRequest {
        challenge,
        solution_repo,
        startup_command,
        credential: load_credential()?,
    };

    let orchestrator = Orchestrator::new(settings, Arc::new(GitCli::new()), Arc::new(engine))
        .with_observer(|phase| {
            if let Some(step) = step_number(phase) {
                print_step(step, TOTAL_STEPS, &phase.to_string());
            }
        });

    match orchestrator.run(&request).await.context("Verification failed")? {
        RunOutcome::Completed(report) => {
            println!();
            print_success(&format!("Result received (task {})", report.task_id));
            print_key_value("Image", report.image.as_str());
            if let Some(path) = &report.persisted_to {
                print_key_value("Saved to", &path.display().to_string());
            }
            println!();
            println!("{}", serde_json::to_string_pretty(&report.payload)?);
            if let Some(err) = &report.teardown_error {
                println!();
                print_warning(&format!("Runner stack was not stopped: {}", err));
            }
            Ok(())
        }
        RunOutcome::Aborted(reason) => {
            print_warning(&reason.to_string());
            Err(anyhow!("Verification aborted"))
        }
    }
}
