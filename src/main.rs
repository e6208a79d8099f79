mod cli;
mod cloud;
mod commands;
mod config;
mod envid;
mod progress;
mod reconciler;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub state_dir: PathBuf,
    pub debug: bool,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else if cli.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let ctx = Context {
        state_dir: config::state_dir(&cli.state_dir),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    match run(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Plan(args) => commands::lifecycle::plan(ctx, &args),
        Command::Up(args) => commands::lifecycle::up(ctx, &args),
        Command::Rotate => commands::lifecycle::rotate(ctx),
        Command::Down => commands::lifecycle::down(ctx),
        Command::Destroy(args) => commands::lifecycle::destroy(ctx, &args),
        Command::CreateLbs(args) => commands::lbs::create(ctx, &args),
        Command::UpdateLbs(args) => commands::lbs::update(ctx, &args),
        Command::DeleteLbs => commands::lbs::delete(ctx),
        Command::Lbs => commands::lbs::show(ctx),
        Command::Outputs => commands::info::outputs(ctx),
        Command::DirectorAddress => commands::info::director_address(ctx),
        Command::DirectorUsername => commands::info::director_username(ctx),
        Command::DirectorPassword => commands::info::director_password(ctx),
        Command::DirectorCaCert => commands::info::director_ca_cert(ctx),
        Command::JumpboxAddress => commands::info::jumpbox_address(ctx),
        Command::EnvId => commands::info::env_id(ctx),
        Command::SshKey => commands::info::ssh_key(ctx),
        Command::DirectorSshKey => commands::info::director_ssh_key(ctx),
        Command::PrintEnv => commands::print_env::run(ctx),
        Command::BoshDeploymentVars => commands::info::bosh_deployment_vars(ctx),
        Command::JumpboxDeploymentVars => commands::info::jumpbox_deployment_vars(ctx),
        Command::LatestError => commands::info::latest_error(ctx),
        Command::Version => {
            commands::info::version();
            Ok(())
        }
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "bbl", &mut io::stdout());
            Ok(())
        }
    }
}

/// 2 when terraform, a create-env script or the director CLI failed,
/// 1 for everything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    let tool_failure = err.chain().any(|cause| {
        cause
            .downcast_ref::<tfkit::Error>()
            .is_some_and(tfkit::Error::is_tool_failure)
            || cause
                .downcast_ref::<boshkit::Error>()
                .is_some_and(boshkit::Error::is_tool_failure)
    });
    if tool_failure { 2 } else { 1 }
}
