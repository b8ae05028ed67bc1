//! Challenge Runner CLI
//!
//! Verify a solution against a challenge, set up a local workspace, or
//! store user configuration.

mod commands;
mod style;

use anyhow::Result;
use challenge_runner::RunnerSettings;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chall")]
#[command(about = "Build, run and verify challenge solutions")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Orchestrator settings
#[derive(Args, Debug)]
struct SettingsArgs {
    /// Directory holding per-challenge build contexts
    #[arg(
        long,
        global = true,
        default_value = ".build-context",
        env = "CHALLENGE_RUNNER_BUILD_ROOT"
    )]
    build_root: PathBuf,

    /// Support library copied into build contexts and workspaces
    #[arg(
        long,
        global = true,
        default_value = "fs_lib",
        env = "CHALLENGE_RUNNER_SUPPORT_LIBRARY"
    )]
    support_library: PathBuf,

    /// Directory new workspaces are created in
    #[arg(
        long,
        global = true,
        default_value = ".",
        env = "CHALLENGE_RUNNER_WORKSPACE_ROOT"
    )]
    workspace_root: PathBuf,

    /// Address the result listener binds
    #[arg(
        long,
        global = true,
        default_value = "0.0.0.0:8080",
        env = "CHALLENGE_RUNNER_CALLBACK_BIND"
    )]
    callback_bind: SocketAddr,

    /// Host the runner uses to reach the result listener
    #[arg(
        long,
        global = true,
        default_value = "host.docker.internal",
        env = "CHALLENGE_RUNNER_CALLBACK_HOST"
    )]
    callback_host: String,

    /// Full callback URL handed to the runner (overrides --callback-host)
    #[arg(long, global = true, env = "CHALLENGE_RUNNER_CALLBACK_URL")]
    callback_url: Option<String>,

    /// Seconds to wait for the runner result (default: wait forever)
    #[arg(long, global = true, env = "CHALLENGE_RUNNER_CALLBACK_TIMEOUT")]
    callback_timeout: Option<u64>,

    /// Reuse an existing image for the current revision instead of rebuilding
    #[arg(long, global = true, env = "CHALLENGE_RUNNER_REUSE_IMAGE")]
    reuse_image: bool,

    /// Also save each result payload in this directory
    #[arg(long, global = true, env = "CHALLENGE_RUNNER_RESULTS_DIR")]
    results_dir: Option<PathBuf>,

    /// Give up after this many workspace name probes
    #[arg(long, global = true, env = "CHALLENGE_RUNNER_MAX_WORKSPACE_PROBES")]
    max_workspace_probes: Option<u32>,
}

impl From<SettingsArgs> for RunnerSettings {
    fn from(args: SettingsArgs) -> Self {
        Self {
            build_root: args.build_root,
            support_library: args.support_library,
            workspace_root: args.workspace_root,
            callback_bind: args.callback_bind,
            callback_host: args.callback_host,
            callback_url: args.callback_url,
            callback_timeout: args.callback_timeout.map(Duration::from_secs),
            force_rebuild: !args.reuse_image,
            results_dir: args.results_dir,
            max_workspace_probes: args.max_workspace_probes,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the challenge image and run it against a solution repository
    #[command(visible_alias = "v")]
    Verify {
        /// Challenge name, e.g. web-basics
        challenge: String,

        /// Solution repository URL
        repo: String,

        /// Command the runner uses to start the solution
        startup_command: Option<String>,
    },

    /// Create a local workspace with the challenge and solution checked out
    Init {
        /// Challenge name
        challenge: String,

        /// Solution repository URL
        repo: String,
    },

    /// Set a configuration value
    Config {
        /// Configuration key (github_token)
        key: String,

        /// Value to store
        value: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,challenge_runner=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        style::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = RunnerSettings::from(cli.settings);
    match cli.command {
        Commands::Verify {
            challenge,
            repo,
            startup_command,
        } => commands::verify::run(settings, &challenge, &repo, startup_command).await,
        Commands::Init { challenge, repo } => {
            commands::init::run(settings, &challenge, &repo).await
        }
        Commands::Config { key, value } => commands::config::run(&key, &value),
    }
}
