//! External tool invocation
//!
//! Every tool (git, docker compose, python) is started from an argument
//! vector, never through a shell, so caller-supplied addresses cannot be
//! interpreted as shell syntax.

use crate::error::{OrchestratorError, OrchestratorResult};
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Result of running an external command
#[derive(Clone, Debug)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// A command to run: program, arguments, working directory and extra
/// environment layered over the inherited one.
#[derive(Clone, Debug)]
pub struct ToolCommand<'a> {
    program: &'a str,
    args: Vec<&'a str>,
    cwd: Option<&'a Path>,
    env: Vec<(&'a str, &'a str)>,
}

impl<'a> ToolCommand<'a> {
    pub fn new(program: &'a str) -> Self {
        Self {
            program,
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: &'a str) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: &[&'a str]) -> Self {
        self.args.extend_from_slice(args);
        self
    }

    pub fn current_dir(mut self, dir: &'a Path) -> Self {
        self.cwd = Some(dir);
        self
    }

    pub fn env(mut self, key: &'a str, value: &'a str) -> Self {
        self.env.push((key, value));
        self
    }

    /// Run to completion and capture its output.
    ///
    /// A non-zero exit is not an error here; callers map it to the failure
    /// kind of their step.
    pub async fn run(self) -> OrchestratorResult<ExecResult> {
        let start = Instant::now();
        let mut cmd = Command::new(self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        debug!(program = self.program, args = ?self.args.len(), "running command");

        let output = cmd
            .output()
            .await
            .map_err(|source| OrchestratorError::CommandSpawn {
                program: self.program.to_string(),
                source,
            })?;

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
