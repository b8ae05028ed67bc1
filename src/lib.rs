//! Challenge Runner
//!
//! Builds a challenge's runner image from its current upstream revision,
//! runs it against a user's solution repository and collects the single
//! result document the runner posts back. Also prepares local editable
//! workspaces for a challenge.
//!
//! ## Module Structure
//!
//! - `repository`: identifiers, addresses, revision tags and image names
//! - `source_control`: git capability (`SourceControl`, `GitCli`)
//! - `docker`: container engine capability (`ContainerEngine`, `DockerEngine`)
//! - `version`: challenge revision resolution
//! - `build_context`: clean build context assembly
//! - `image`: image cache gate and image builder
//! - `launcher`: runner launch contract and teardown
//! - `rendezvous`: single-shot result listener
//! - `workspace`: workspace allocation and runtime provisioning
//! - `lifecycle`: the run and initialize flows
//! - `config`: runner settings and persisted user config

pub mod build_context;
pub mod config;
pub mod docker;
pub mod error;
pub mod image;
pub mod launcher;
pub mod lifecycle;
pub mod process;
pub mod rendezvous;
pub mod repository;
pub mod source_control;
pub mod version;
pub mod workspace;

pub use build_context::{copy_tree, BuildContextAssembler, SUPPORT_LIBRARY_DIR};
pub use config::{RunnerSettings, UserConfig, GITHUB_TOKEN_KEY, KNOWN_KEYS};
pub use docker::{ComposeEnv, ContainerEngine, DockerEngine};
pub use error::{OrchestratorError, OrchestratorResult};
pub use image::{ImageBuilder, ImageCacheGate, RunnerConfig};
pub use launcher::{LaunchArguments, RunnerLauncher};
pub use lifecycle::{
    AbortReason, InitOutcome, InitPhase, InitRequest, Orchestrator, RunOutcome, RunPhase,
    RunReport, RunRequest, WorkspaceInitializer, WorkspaceReport,
};
pub use process::{ExecResult, ToolCommand};
pub use rendezvous::{CallbackRequest, ResultPayload, ResultRendezvous};
pub use repository::{ChallengeId, ImageHandle, RepositoryAddress, RevisionTag};
pub use source_control::{GitCli, SourceControl};
pub use version::VersionResolver;
pub use workspace::{allocate_workspace, PythonVenv, RuntimeProvisioner};
