//! ---
//! arb_section: "06-operator-cli"
//! arb_subsection: "binary"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Operator CLI for provisioning the host and launching the bot."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use arb_deploy_common::{init_tracing, VersionInfo};
use arb_deploy_host::CommandError;
use arb_deploy_logging as logging;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};

mod context;
mod doctor;
mod provision;
mod service;

use context::DeployContext;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Provision the container runtime and launch the arbitrage bot",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    /// Configuration file (takes precedence over ARB_DEPLOY_CONFIG and the default search path).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the service definition, .env and state files.
    #[arg(short = 'C', long = "working-dir", global = true, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install the container engine and compose plugin if absent (requires root).
    Provision,
    /// Create the .env placeholder and state files without starting anything.
    Prepare,
    /// Prepare files, build the image and (re)start the service detached.
    Launch,
    /// Provision the host, then launch the service.
    Bootstrap,
    /// Show running containers and the live-log command.
    Status,
    /// Follow the service's live logs.
    Logs,
    /// Report configuration, credentials and runtime health without changing anything.
    Doctor,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return ExitCode::SUCCESS;
    }
    let Some(command) = cli.command else {
        // Help output failing to write is not actionable.
        let _ = Cli::command().print_help();
        return ExitCode::from(2);
    };

    match run(command, cli.config, cli.working_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    }
}

fn run(command: Commands, config: Option<PathBuf>, working_dir: Option<PathBuf>) -> Result<()> {
    let ctx = DeployContext::load(config.as_deref(), working_dir.as_deref())?;
    // Held until the command returns so the log file is flushed.
    let _tracing = match init_tracing("arb-deployctl", &ctx.config.logging) {
        Ok(guard) => Some(guard),
        Err(err) => {
            logging::init();
            tracing::warn!(error = %err, "falling back to console-only logging");
            None
        }
    };
    tracing::debug!(source = ?ctx.source, "configuration loaded");

    match command {
        Commands::Provision => provision::provision(&ctx),
        Commands::Prepare => service::prepare(&ctx),
        Commands::Launch => service::launch(&ctx),
        Commands::Bootstrap => provision::bootstrap(&ctx),
        Commands::Status => service::status(&ctx),
        Commands::Logs => service::logs(&ctx),
        Commands::Doctor => doctor::run(&ctx),
    }
}

/// Exit with the failing external command's status when there is one.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<CommandError>())
        .and_then(CommandError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0);
    match code {
        Some(code) => ExitCode::from(code),
        None => ExitCode::FAILURE,
    }
}
