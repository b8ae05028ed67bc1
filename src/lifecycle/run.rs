//! Run flow: build the challenge image, run it against a solution and
//! collect the runner's result

use super::{check_existence, notify, AbortReason, PhaseObserver, RunPhase};
use crate::build_context::BuildContextAssembler;
use crate::config::RunnerSettings;
use crate::docker::ContainerEngine;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::image::{ImageBuilder, ImageCacheGate};
use crate::launcher::{LaunchArguments, RunnerLauncher};
use crate::rendezvous::{ResultPayload, ResultRendezvous, SECRET_FIELD};
use crate::repository::{ChallengeId, ImageHandle, RepositoryAddress};
use crate::source_control::SourceControl;
use crate::version::VersionResolver;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// What to run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub challenge: ChallengeId,
    pub solution_repo: RepositoryAddress,
    /// `None` lets the image pick its default startup command.
    pub startup_command: Option<String>,
    /// Access token embedded into the solution address.
    pub credential: Option<String>,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub challenge: ChallengeId,
    pub image: ImageHandle,
    /// Whether the image was (re)built during this run
    pub rebuilt: bool,
    pub task_id: String,
    pub payload: ResultPayload,
    /// Where the payload was persisted, if a results directory is configured
    pub persisted_to: Option<PathBuf>,
    /// Set when the runner stack could not be stopped after the result arrived
    pub teardown_error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    Aborted(AbortReason),
}

/// On-disk form of a persisted result
#[derive(Serialize)]
struct PersistedResult<'a> {
    challenge: &'a str,
    image: &'a str,
    task_id: &'a str,
    received_at: DateTime<Utc>,
    result: &'a ResultPayload,
}

/// Drives the run flow over explicit capability handles
pub struct Orchestrator {
    settings: RunnerSettings,
    source_control: Arc<dyn SourceControl>,
    resolver: VersionResolver,
    gate: ImageCacheGate,
    assembler: BuildContextAssembler,
    builder: ImageBuilder,
    launcher: RunnerLauncher,
    observer: Option<PhaseObserver<RunPhase>>,
}

impl Orchestrator {
    pub fn new(
        settings: RunnerSettings,
        source_control: Arc<dyn SourceControl>,
        engine: Arc<dyn ContainerEngine>,
    ) -> Self {
        let assembler = BuildContextAssembler::new(
            settings.build_root.clone(),
            settings.support_library.clone(),
            source_control.clone(),
        );
        Self {
            resolver: VersionResolver::new(source_control.clone()),
            gate: ImageCacheGate::new(engine.clone()),
            builder: ImageBuilder::new(engine.clone()),
            launcher: RunnerLauncher::new(engine),
            assembler,
            source_control,
            settings,
            observer: None,
        }
    }

    /// Report every phase transition to `observer`.
    pub fn with_observer(mut self, observer: impl Fn(RunPhase) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    #[instrument(skip(self, request), fields(challenge = %request.challenge))]
    pub async fn run(&self, request: &RunRequest) -> OrchestratorResult<RunOutcome> {
        let challenge = &request.challenge;
        let challenge_repo = VersionResolver::challenge_repository(challenge);
        let solution_repo = request
            .solution_repo
            .with_credential(request.credential.as_deref());

        self.enter(RunPhase::Resolving);
        if let Some(reason) =
            check_existence(self.source_control.as_ref(), challenge, &solution_repo).await
        {
            warn!("{}", reason);
            self.enter(RunPhase::Aborted);
            return Ok(RunOutcome::Aborted(reason));
        }
        // Resolved once; every later step uses this snapshot.
        let revision = self.resolver.resolve_revision(&challenge_repo).await?;
        let image = ImageHandle::new(challenge, &revision);
        info!("Challenge {} is at revision {}", challenge, revision);

        self.enter(RunPhase::Gating);
        let up_to_date = match self.gate.is_up_to_date(&image).await {
            Ok(up_to_date) => up_to_date,
            // The answer cannot change the path when rebuilding anyway.
            Err(e) if self.settings.force_rebuild => {
                warn!("Image check for {} failed, rebuilding: {}", image, e);
                false
            }
            Err(e) => return Err(e),
        };
        let rebuild = self.settings.force_rebuild || !up_to_date;
        if up_to_date && rebuild {
            info!("Image {} exists but rebuild is forced", image);
        }

        let context_dir = if rebuild {
            self.enter(RunPhase::Assembling);
            let dir = self.assembler.assemble(challenge).await?;
            self.enter(RunPhase::Building);
            self.builder.build(&dir, &image, &challenge_repo).await?;
            dir
        } else {
            info!("Reusing image {}", image);
            let dir = self.assembler.context_dir(challenge);
            // The compose file lives in the context; recreate it if it is gone.
            if dir.is_dir() {
                dir
            } else {
                self.enter(RunPhase::Assembling);
                self.assembler.assemble(challenge).await?
            }
        };

        let rendezvous = ResultRendezvous::bind(self.settings.callback_bind).await?;
        let bound = rendezvous.local_addr()?;
        let task_id = Uuid::new_v4().to_string();
        let secret = generate_secret();
        let rendezvous = rendezvous.with_secret(secret.clone());

        self.enter(RunPhase::Launching);
        let args = LaunchArguments {
            target_repo: solution_repo,
            startup_command: request.startup_command.clone(),
            callback_url: self.settings.callback_url_for(bound),
            task_id: task_id.clone(),
            secret,
        };
        self.launcher.launch(&context_dir, &image, &args).await?;

        self.enter(RunPhase::AwaitingResult);
        let callback = rendezvous.receive(self.settings.callback_timeout).await?;
        let payload = strip_secret(callback.json()?);

        self.enter(RunPhase::Reporting);
        let persisted_to = self.persist(challenge, &image, &task_id, &payload)?;

        // The result is already in hand; a failed teardown is reported with it.
        self.enter(RunPhase::TearingDown);
        let teardown_error = match self.launcher.teardown(&context_dir, &image).await {
            Ok(()) => None,
            Err(e) => {
                warn!("{}", e);
                Some(e.to_string())
            }
        };

        self.enter(RunPhase::Done);
        Ok(RunOutcome::Completed(RunReport {
            challenge: challenge.clone(),
            image,
            rebuilt: rebuild,
            task_id,
            payload,
            persisted_to,
            teardown_error,
        }))
    }

    fn persist(
        &self,
        challenge: &ChallengeId,
        image: &ImageHandle,
        task_id: &str,
        payload: &ResultPayload,
    ) -> OrchestratorResult<Option<PathBuf>> {
        let Some(dir) = &self.settings.results_dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir).map_err(|e| OrchestratorError::filesystem(dir, e))?;

        let path = dir.join(format!("{}-{}.json", challenge, task_id));
        let record = PersistedResult {
            challenge: challenge.as_str(),
            image: image.as_str(),
            task_id,
            received_at: Utc::now(),
            result: payload,
        };
        std::fs::write(&path, serde_json::to_string_pretty(&record)?)
            .map_err(|e| OrchestratorError::filesystem(&path, e))?;
        info!("Result saved to {}", path.display());
        Ok(Some(path))
    }

    fn enter(&self, phase: RunPhase) {
        info!(phase = ?phase, "{}", phase);
        notify(&self.observer, phase);
    }
}

/// Drop a top-level `secret` field the runner may have authenticated with.
fn strip_secret(mut payload: ResultPayload) -> ResultPayload {
    if let Some(fields) = payload.as_object_mut() {
        fields.remove(SECRET_FIELD);
    }
    payload
}

/// 32 random bytes, hex encoded.
fn generate_secret() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::fakes::{EngineCall, FakeEngine, FakeRemote};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const HEAD: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678";
    const CHALLENGE_REPO: &str = "https://github.com/foxskills-dev/challenge-web-basics.git";
    const SOLUTION_REPO: &str = "https://github.com/alice/solution.git";

    struct Fixture {
        tmp: TempDir,
        settings: RunnerSettings,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let lib = tmp.path().join("fs_lib");
        std::fs::create_dir_all(lib.join("build")).unwrap();
        std::fs::write(lib.join("build/requirements.txt"), "requests\n").unwrap();

        let settings = RunnerSettings {
            build_root: tmp.path().join(".build-context"),
            support_library: lib,
            workspace_root: tmp.path().to_path_buf(),
            callback_bind: "127.0.0.1:0".parse().unwrap(),
            callback_host: "127.0.0.1".to_string(),
            callback_timeout: Some(Duration::from_secs(10)),
            ..RunnerSettings::default()
        };
        Fixture { tmp, settings }
    }

    fn request() -> RunRequest {
        RunRequest {
            challenge: ChallengeId::parse("web-basics").unwrap(),
            solution_repo: RepositoryAddress::parse(SOLUTION_REPO).unwrap(),
            startup_command: Some("python main.py".to_string()),
            credential: None,
        }
    }

    /// Pull the quoted launch arguments back out of the `ARGS` variable.
    fn launch_args(env: &crate::docker::ComposeEnv) -> Vec<String> {
        let value = &env.iter().find(|(k, _)| k == "ARGS").unwrap().1;
        value
            .split("\" \"")
            .map(|part| part.trim_matches('"').to_string())
            .collect()
    }

    /// Engine whose `compose up` plays the runner: it posts `body` to the
    /// advertised callback URL with the secret header.
    fn engine_posting(body: serde_json::Value, images: &[&str]) -> Arc<FakeEngine> {
        posting_runner(
            FakeEngine {
                images: images.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            body,
        )
    }

    /// Install the posting runner on an engine configured by the caller.
    fn posting_runner(engine: FakeEngine, body: serde_json::Value) -> Arc<FakeEngine> {
        *engine.on_up.lock() = Some(Box::new(move |env: &crate::docker::ComposeEnv| {
            let args = launch_args(env);
            let url = args[2].clone();
            let secret = args[4].clone();
            tokio::spawn(async move {
                reqwest::Client::new()
                    .post(format!("{}/results", url))
                    .header("X-Runner-Secret", secret)
                    .json(&body)
                    .send()
                    .await
                    .unwrap();
            });
        }));
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_run_surfaces_callback_payload() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let body = serde_json::json!({"score": 100, "passed": true});
        let engine = engine_posting(body.clone(), &[]);

        let phases = Arc::new(Mutex::new(Vec::new()));
        let seen = phases.clone();
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone())
            .with_observer(move |phase| seen.lock().push(phase));

        let outcome = orchestrator.run(&request()).await.unwrap();
        let report = match outcome {
            RunOutcome::Completed(report) => report,
            other => panic!("Expected completed run, got: {:?}", other),
        };

        assert_eq!(report.payload, body);
        assert_eq!(report.image.as_str(), "web-basics-a1b2c3d4e5f6");
        assert!(report.rebuilt);
        assert_eq!(
            *phases.lock(),
            vec![
                RunPhase::Resolving,
                RunPhase::Gating,
                RunPhase::Assembling,
                RunPhase::Building,
                RunPhase::Launching,
                RunPhase::AwaitingResult,
                RunPhase::Reporting,
                RunPhase::TearingDown,
                RunPhase::Done,
            ]
        );

        let calls = engine.calls.lock();
        let context = fx.tmp.path().join(".build-context/web-basics");
        assert!(matches!(&calls[0], EngineCall::ImageExists(name) if name == "web-basics-a1b2c3d4e5f6"));
        assert!(matches!(&calls[1], EngineCall::Build(dir, _) if *dir == context));
        match &calls[2] {
            EngineCall::Up(dir, env) => {
                assert_eq!(*dir, context);
                let args = launch_args(env);
                assert_eq!(args.len(), 5);
                assert_eq!(args[0], SOLUTION_REPO);
                assert_eq!(args[1], "python main.py");
                assert_eq!(args[3], report.task_id);
                assert_eq!(args[4].len(), 64);
            }
            other => panic!("Expected compose up, got: {:?}", other),
        }
        match &calls[3] {
            EngineCall::Down(dir, env) => {
                assert_eq!(*dir, context);
                assert_eq!(
                    env[0],
                    ("IMAGE_NAME".to_string(), "web-basics-a1b2c3d4e5f6".to_string())
                );
            }
            other => panic!("Expected compose down, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_aborts_without_side_effects_when_no_repo_exists() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[], HEAD));
        let engine = Arc::new(FakeEngine::default());
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote.clone(), engine.clone());

        let outcome = orchestrator.run(&request()).await.unwrap();
        match outcome {
            RunOutcome::Aborted(AbortReason::RepoNotFound {
                challenge_repo,
                solution_repo,
            }) => {
                assert_eq!(challenge_repo, CHALLENGE_REPO);
                assert_eq!(solution_repo, SOLUTION_REPO);
            }
            other => panic!("Expected abort, got: {:?}", other),
        }

        assert!(engine.calls.lock().is_empty());
        assert!(!fx.settings.build_root.exists());
        assert!(remote
            .calls
            .lock()
            .iter()
            .all(|call| call.starts_with("exists ")));
    }

    #[tokio::test]
    async fn test_challenge_repo_alone_passes_existence_check() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[CHALLENGE_REPO], HEAD));
        let engine = engine_posting(serde_json::json!({"ok": 1}), &[]);
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine);

        let outcome = orchestrator.run(&request()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_force_rebuild_ignores_existing_image() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = engine_posting(serde_json::json!({}), &["web-basics-a1b2c3d4e5f6"]);
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone());

        let RunOutcome::Completed(report) = orchestrator.run(&request()).await.unwrap() else {
            panic!("Expected completed run");
        };
        assert!(report.rebuilt);
        assert!(engine
            .calls
            .lock()
            .iter()
            .any(|call| matches!(call, EngineCall::Build(..))));
    }

    #[tokio::test]
    async fn test_up_to_date_image_is_reused_when_rebuild_not_forced() {
        let mut fx = fixture();
        fx.settings.force_rebuild = false;
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = engine_posting(serde_json::json!({}), &["web-basics-a1b2c3d4e5f6"]);

        let phases = Arc::new(Mutex::new(Vec::new()));
        let seen = phases.clone();
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone())
            .with_observer(move |phase| seen.lock().push(phase));

        let RunOutcome::Completed(report) = orchestrator.run(&request()).await.unwrap() else {
            panic!("Expected completed run");
        };
        assert!(!report.rebuilt);
        assert!(!phases.lock().contains(&RunPhase::Building));
        assert!(!engine
            .calls
            .lock()
            .iter()
            .any(|call| matches!(call, EngineCall::Build(..))));
        // Context recreated so compose has a project to start.
        assert!(fx
            .tmp
            .path()
            .join(".build-context/web-basics/fs_lib")
            .is_dir());
    }

    #[tokio::test]
    async fn test_build_failure_leaves_context_and_skips_launch() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = Arc::new(FakeEngine {
            build_exit: 1,
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone());

        let err = orchestrator.run(&request()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::BuildFailed { .. }));
        assert!(fx.tmp.path().join(".build-context/web-basics").is_dir());
        assert!(!engine
            .calls
            .lock()
            .iter()
            .any(|call| matches!(call, EngineCall::Up(..) | EngineCall::Down(..))));
    }

    #[tokio::test]
    async fn test_credential_embedded_in_launch_target() {
        let fx = fixture();
        let authed = "https://ghp_x@github.com/alice/solution.git";
        let remote = Arc::new(FakeRemote::with(&[authed], HEAD));
        let engine = engine_posting(serde_json::json!({"passed": false}), &[]);
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone());

        let mut req = request();
        req.credential = Some("ghp_x".to_string());
        req.startup_command = None;
        let outcome = orchestrator.run(&req).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));

        let calls = engine.calls.lock();
        let up = calls
            .iter()
            .find_map(|call| match call {
                EngineCall::Up(_, env) => Some(launch_args(env)),
                _ => None,
            })
            .unwrap();
        assert_eq!(up[0], authed);
        assert_eq!(up[1], "None");
    }

    #[tokio::test]
    async fn test_result_persisted_when_results_dir_set() {
        let mut fx = fixture();
        fx.settings.results_dir = Some(fx.tmp.path().join("results"));
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let body = serde_json::json!({"score": 42});
        let engine = engine_posting(body.clone(), &[]);
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine);

        let RunOutcome::Completed(report) = orchestrator.run(&request()).await.unwrap() else {
            panic!("Expected completed run");
        };
        let path = report.persisted_to.unwrap();
        assert_eq!(
            path,
            fx.tmp
                .path()
                .join(format!("results/web-basics-{}.json", report.task_id))
        );
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["result"], body);
        assert_eq!(saved["image"], "web-basics-a1b2c3d4e5f6");
    }

    #[tokio::test]
    async fn test_silent_runner_times_out_without_teardown() {
        let mut fx = fixture();
        fx.settings.callback_timeout = Some(Duration::from_millis(100));
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = Arc::new(FakeEngine::default());
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone());

        let err = orchestrator.run(&request()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::RendezvousTimeout(_)));
        assert!(!engine
            .calls
            .lock()
            .iter()
            .any(|call| matches!(call, EngineCall::Down(..))));
    }

    #[tokio::test]
    async fn test_failed_teardown_keeps_delivered_result() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let body = serde_json::json!({"score": 100, "passed": true});
        let engine = posting_runner(
            FakeEngine {
                down_exit: 1,
                ..Default::default()
            },
            body.clone(),
        );
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone());

        let RunOutcome::Completed(report) = orchestrator.run(&request()).await.unwrap() else {
            panic!("Expected completed run");
        };
        assert_eq!(report.payload, body);
        let teardown_error = report.teardown_error.unwrap();
        assert!(teardown_error.contains("teardown failed for web-basics-a1b2c3d4e5f6"));
        assert!(teardown_error.contains("compose failed"));
        assert!(engine
            .calls
            .lock()
            .iter()
            .any(|call| matches!(call, EngineCall::Down(..))));
    }

    #[tokio::test]
    async fn test_clean_teardown_reports_no_error() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = engine_posting(serde_json::json!({"passed": true}), &[]);
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine);

        let RunOutcome::Completed(report) = orchestrator.run(&request()).await.unwrap() else {
            panic!("Expected completed run");
        };
        assert!(report.teardown_error.is_none());
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal_without_teardown() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = Arc::new(FakeEngine {
            up_exit: 1,
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone());

        let err = orchestrator.run(&request()).await.unwrap_err();
        match err {
            OrchestratorError::LaunchFailed { image, output } => {
                assert_eq!(image, "web-basics-a1b2c3d4e5f6");
                assert!(output.contains("compose failed"));
            }
            other => panic!("Expected LaunchFailed, got: {:?}", other),
        }
        let calls = engine.calls.lock();
        assert!(matches!(calls.last(), Some(EngineCall::Up(..))));
        assert!(!calls.iter().any(|call| matches!(call, EngineCall::Down(..))));
        assert!(fx.tmp.path().join(".build-context/web-basics").is_dir());
    }

    #[tokio::test]
    async fn test_secret_field_removed_from_reported_payload() {
        let mut fx = fixture();
        fx.settings.results_dir = Some(fx.tmp.path().join("results"));
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = Arc::new(FakeEngine::default());
        // Runner authenticating through the body instead of the header
        *engine.on_up.lock() = Some(Box::new(|env: &crate::docker::ComposeEnv| {
            let args = launch_args(env);
            let (url, secret) = (args[2].clone(), args[4].clone());
            tokio::spawn(async move {
                reqwest::Client::new()
                    .post(url)
                    .json(&serde_json::json!({"secret": secret, "score": 7}))
                    .send()
                    .await
                    .unwrap();
            });
        }));
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine);

        let RunOutcome::Completed(report) = orchestrator.run(&request()).await.unwrap() else {
            panic!("Expected completed run");
        };
        assert_eq!(report.payload, serde_json::json!({"score": 7}));
        let saved = std::fs::read_to_string(report.persisted_to.unwrap()).unwrap();
        assert!(!saved.contains("secret"));
    }

    #[test]
    fn test_strip_secret_leaves_other_documents() {
        assert_eq!(
            strip_secret(serde_json::json!({"secret": "s", "nested": {"secret": "kept"}})),
            serde_json::json!({"nested": {"secret": "kept"}})
        );
        assert_eq!(
            strip_secret(serde_json::json!([1, 2])),
            serde_json::json!([1, 2])
        );
    }

    #[tokio::test]
    async fn test_image_check_error_ignored_when_rebuild_forced() {
        let fx = fixture();
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = posting_runner(
            FakeEngine {
                inspect_fails: true,
                ..Default::default()
            },
            serde_json::json!({"passed": true}),
        );
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone());

        let RunOutcome::Completed(report) = orchestrator.run(&request()).await.unwrap() else {
            panic!("Expected completed run");
        };
        assert!(report.rebuilt);
        assert!(engine
            .calls
            .lock()
            .iter()
            .any(|call| matches!(call, EngineCall::Build(..))));
    }

    #[tokio::test]
    async fn test_image_check_error_fatal_when_reuse_allowed() {
        let mut fx = fixture();
        fx.settings.force_rebuild = false;
        let remote = Arc::new(FakeRemote::with(&[SOLUTION_REPO], HEAD));
        let engine = Arc::new(FakeEngine {
            inspect_fails: true,
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(fx.settings.clone(), remote, engine.clone());

        let err = orchestrator.run(&request()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::EngineUnavailable(_)));
        assert_eq!(engine.calls.lock().len(), 1);
    }

    #[test]
    fn test_generate_secret_is_random_hex() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
