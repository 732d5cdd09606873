mod cli;
mod commands;
mod config;
mod hosts;
mod paths;
mod progress;
mod remote;
mod session;
mod steps;
mod tasks;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, ClusterCommand, Command, ConfigCommand, HostsCommand};
use commands::CommandError;
use commands::lifecycle::Action;
use std::io;
use std::process::ExitCode;
use topology::Filter;

/// Exit code of a declined confirmation
const EXIT_CANCELLED: u8 = 130;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match dispatch(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.downcast_ref::<CommandError>().is_some() => {
            ui::warn(&err.to_string());
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(err) => {
            ui::error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Cluster(cmd) => match cmd {
            ClusterCommand::Add {
                name,
                topology,
                description,
                checkout,
            } => commands::cluster::add(ctx, &name, &topology, description.as_deref(), checkout),
            ClusterCommand::Checkout { name } => commands::cluster::checkout(ctx, &name),
            ClusterCommand::List { long } => commands::cluster::list(ctx, long),
            ClusterCommand::Remove { name, yes } => commands::cluster::remove(ctx, &name, yes),
        },
        Command::Hosts(cmd) => match cmd {
            HostsCommand::Commit { file } => commands::hosts::commit(ctx, &file),
            HostsCommand::Show { raw } => commands::hosts::show(ctx, raw),
        },
        Command::Config(cmd) => match cmd {
            ConfigCommand::Show => commands::config::show(ctx),
            ConfigCommand::Commit { file, yes } => commands::config::commit(ctx, &file, yes),
            ConfigCommand::Init => commands::config::init(ctx),
            ConfigCommand::Settings => commands::config::settings(),
        },
        Command::Deploy(args) => commands::deploy::run(ctx, args.jobs.get(), &args.skip, args.local),
        Command::Start(args) => commands::lifecycle::run(
            ctx,
            Action::Start,
            &Filter::from(&args.filter),
            args.jobs.get(),
            true,
            &[],
        ),
        Command::Stop(args) => commands::lifecycle::run(
            ctx,
            Action::Stop,
            &Filter::from(&args.filter),
            args.jobs.get(),
            args.yes,
            &[],
        ),
        Command::Restart(args) => commands::lifecycle::run(
            ctx,
            Action::Restart,
            &Filter::from(&args.filter),
            args.jobs.get(),
            args.yes,
            &[],
        ),
        Command::Reload(args) => commands::lifecycle::run(
            ctx,
            Action::Reload,
            &Filter::from(&args.filter),
            args.jobs.get(),
            true,
            &[],
        ),
        Command::Status(args) => commands::status::run(
            ctx,
            &Filter::from(&args.filter),
            args.jobs.get(),
            args.expand,
        ),
        Command::Clean(args) => commands::lifecycle::run(
            ctx,
            Action::Clean,
            &Filter::from(&args.filter),
            args.jobs.get(),
            args.yes,
            &args.only,
        ),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "stackadm", &mut io::stdout());
            Ok(())
        }
    }
}
