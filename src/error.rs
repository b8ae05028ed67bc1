//! Error types for challenge orchestration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for orchestration operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors that can occur while building, running or initializing a challenge.
///
/// Every variant is fatal for the flow that produced it. A missing repository
/// is not an error: it is reported as an aborted outcome instead.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Remote unreachable: {address}: {detail}")]
    RemoteUnreachable { address: String, detail: String },

    #[error("Clone failed: {address}: {detail}")]
    CloneFailed { address: String, detail: String },

    #[error("Image build failed for {image}:\n{output}")]
    BuildFailed { image: String, output: String },

    #[error("Runner launch failed for {image}:\n{output}")]
    LaunchFailed { image: String, output: String },

    #[error("Runner teardown failed for {image}:\n{output}")]
    TeardownFailed { image: String, output: String },

    #[error("No result received from runner within {0:?}")]
    RendezvousTimeout(Duration),

    #[error("Result listener error: {0}")]
    Rendezvous(String),

    #[error("Invalid result payload: {0}")]
    InvalidPayload(String),

    #[error("No free workspace directory for '{name}' after {attempts} attempts")]
    WorkspaceAllocationExhausted { name: String, attempts: u32 },

    #[error("Runtime provisioning failed: {0}")]
    ProvisionFailed(String),

    #[error("Container engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Failed to run {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrchestratorError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OrchestratorError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for OrchestratorError {
    fn from(err: toml::de::Error) -> Self {
        OrchestratorError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for OrchestratorError {
    fn from(err: toml::ser::Error) -> Self {
        OrchestratorError::Serialization(err.to_string())
    }
}
