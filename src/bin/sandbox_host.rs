//! sandbox-host: run untrusted scripts against guarded contexts
//!
//! ## Commands
//!
//! - **check**: verify and compile a script without running it
//! - **run**: evaluate a script against one or more JSON contexts
//!
//! ## Example Usage
//!
//! ```bash
//! # Verify a script under the default policy
//! sandbox-host check rules.py
//!
//! # Evaluate against two contexts in parallel, with a custom policy
//! sandbox-host run rules.py --context a.json --context b.json --policy policy.json
//!
//! # Expose process/network introspection to the script, JSON output
//! SANDBOX_INTROSPECT=1 sandbox-host run uptime.py --json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use namespace_sandbox::HostConfig;

mod host_cli;

use host_cli::{check::CheckCmd, run::RunCmd};

#[derive(Parser)]
#[command(
    name = "sandbox-host",
    author,
    version,
    about = "Verified, guarded evaluation of untrusted scripts",
    long_about = "Checks scripts against a safety policy, then evaluates them against\n\
                  JSON contexts that are screened before any code runs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Policy JSON file (default: $SANDBOX_POLICY, else the built-in policy)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify and compile a script without running it
    Check(CheckCmd),

    /// Evaluate a script against JSON contexts
    Run(RunCmd),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Check(_) => "check",
            Commands::Run(_) => "run",
        }
    }
}

fn main() -> ExitCode {
    let Cli {
        command,
        policy,
        json,
        verbose,
    } = Cli::parse();
    namespace_sandbox::init_logging(verbose);

    let mut config = HostConfig::from_env();
    if policy.is_some() {
        config.policy_path = policy;
    }
    tracing::debug!(command = command.name(), ?config, "starting");

    let result = match command {
        Commands::Check(cmd) => cmd.execute(&config, json),
        Commands::Run(cmd) => cmd.execute(&config, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
