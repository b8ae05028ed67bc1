//! Runner settings and persisted user configuration
//!
//! `RunnerSettings` holds everything the orchestrator needs for one
//! invocation. `UserConfig` is a flat key-value document stored in the
//! user's home directory and read/written wholesale.

use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_DIR_NAME: &str = ".challenge-runner";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Key holding the source-control access token.
pub const GITHUB_TOKEN_KEY: &str = "github_token";

/// Keys accepted by `config <key> <value>`.
pub const KNOWN_KEYS: &[&str] = &[GITHUB_TOKEN_KEY];

/// Default port the result listener binds.
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;

/// Orchestrator settings for a single invocation
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Directory holding one build context per challenge
    pub build_root: PathBuf,
    /// Support library copied into build contexts and workspaces
    pub support_library: PathBuf,
    /// Directory new workspaces are allocated in
    pub workspace_root: PathBuf,
    /// Address the result listener binds
    pub callback_bind: SocketAddr,
    /// Host the runner reaches the listener on
    pub callback_host: String,
    /// Full callback URL, overriding `http://{callback_host}:{bound port}`
    pub callback_url: Option<String>,
    /// Give up waiting for the runner after this long (None = wait forever)
    pub callback_timeout: Option<Duration>,
    /// Rebuild even when an image for the current revision exists
    pub force_rebuild: bool,
    /// Also persist each result payload here
    pub results_dir: Option<PathBuf>,
    /// Upper bound on workspace name probes (None = unbounded)
    pub max_workspace_probes: Option<u32>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            build_root: PathBuf::from(".build-context"),
            support_library: PathBuf::from("fs_lib"),
            workspace_root: PathBuf::from("."),
            callback_bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_CALLBACK_PORT)),
            callback_host: "host.docker.internal".to_string(),
            callback_url: None,
            callback_timeout: None,
            // Always rebuild unless told otherwise.
            force_rebuild: true,
            results_dir: None,
            max_workspace_probes: None,
        }
    }
}

impl RunnerSettings {
    /// URL advertised to the runner once the listener is bound on `bound`.
    pub fn callback_url_for(&self, bound: SocketAddr) -> String {
        match &self.callback_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}", self.callback_host, bound.port()),
        }
    }
}

/// Persisted user configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserConfig {
    values: BTreeMap<String, String>,
}

impl UserConfig {
    /// `~/.challenge-runner/config.toml`
    pub fn default_path() -> OrchestratorResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            OrchestratorError::Config("Could not determine home directory".to_string())
        })?;
        Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`; a missing file is an empty config.
    pub fn load_from(path: &Path) -> OrchestratorResult<Self> {
        if !path.exists() {
            debug!("No config at {}, using empty config", path.display());
            return Ok(Self::default());
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| OrchestratorError::filesystem(path, e))?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to(&self, path: &Path) -> OrchestratorResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OrchestratorError::filesystem(parent, e))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| OrchestratorError::filesystem(path, e))?;
        debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Set a known key.
    pub fn set(&mut self, key: &str, value: &str) -> OrchestratorResult<()> {
        if !KNOWN_KEYS.contains(&key) {
            return Err(OrchestratorError::Config(format!(
                "Invalid key '{}'. Valid keys: {}",
                key,
                KNOWN_KEYS.join(", ")
            )));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn github_token(&self) -> Option<&str> {
        self.get(GITHUB_TOKEN_KEY).filter(|token| !token.is_empty())
    }
}
