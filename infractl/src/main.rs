use std::{io::Write, process::ExitCode};

use clap::Parser;
use cli::{Cli, Commands, LogLevel, LOG_TARGETS};
use commands::{gitlab::gitlab, openldap::openldap, repo_add::repo_add};
use env_logger::Target;
use log::Level;
use prompt::TerminalInput;

mod cli;
mod commands;
mod context;
mod prompt;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    configure_logging(cli.global_args.get_log_level());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("fatal: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let global_args = cli.global_args;

    match cli.command {
        Commands::Openldap(args) => openldap(&global_args, args, &mut TerminalInput).await,
        Commands::Gitlab(args) => gitlab(&global_args, args, &mut TerminalInput).await,
        Commands::RepoAdd(args) => repo_add(&global_args, args).await,
    }
}

fn configure_logging(log_level: LogLevel) {
    let mut logger = env_logger::builder();

    logger
        .target(Target::Stderr)
        .filter(None, log_level.dependencies())
        .format(move |buf, record| {
            let prefix = match record.level() {
                Level::Error => "error: ",
                Level::Warn => "warning: ",
                _ => "",
            };

            match log_level {
                LogLevel::Trace => {
                    writeln!(buf, "{prefix}[{}] {}", record.target(), record.args())
                }
                _ => writeln!(buf, "{prefix}{}", record.args()),
            }
        });

    for target in LOG_TARGETS {
        logger.filter(Some(target), log_level.ours());
    }

    logger.init();
}
