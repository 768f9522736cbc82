// src/main.rs

use anyhow::Result;
use apkg::Distro;
use apkg::pipeline::{BuildDepOptions, InstallOptions, InstallSource};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, LogLevel};

/// Set up logging; RUST_LOG takes precedence over --log-level
fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("apkg={}", level.filter())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Process exit code for the first apkg error in the chain
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|e| e.downcast_ref::<apkg::Error>())
        .map(|e| e.exit_code())
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}

fn run(cli: Cli) -> Result<()> {
    // host distro identity is read once and passed down
    let host = Distro::detect();

    match cli.command {
        Commands::MakeArchive(args) => commands::cmd_make_archive(&args),
        Commands::GetArchive(args) => commands::cmd_get_archive(&args),
        Commands::Srcpkg {
            input,
            build,
            render_template,
        } => commands::cmd_srcpkg(&input, &build, render_template, &host),
        Commands::Build {
            srcpkg,
            input,
            build,
            build_dep,
            isolated,
        } => {
            let opts = commands::build_options(srcpkg, &input, &build, build_dep, isolated, &host);
            commands::cmd_build(&opts)
        }
        Commands::BuildDep {
            srcpkg,
            input,
            distro,
            list,
            yes,
            cache,
        } => commands::cmd_build_dep(&BuildDepOptions {
            upstream: input.upstream,
            srcpkg,
            archive: input.archive,
            input_files: input.input_files,
            input_file_lists: input.input_file_lists,
            distro: apkg::distro::distro_arg(distro.as_deref(), &host),
            list_only: list,
            interactive: !yes,
            use_cache: cache.use_cache(),
        }),
        Commands::Install {
            custom_pkgs,
            distro_pkgs,
            srcpkg,
            input,
            build,
            build_dep,
            isolated,
            yes,
        } => {
            let source = if distro_pkgs {
                InstallSource::Distro
            } else if custom_pkgs {
                InstallSource::Custom
            } else {
                InstallSource::Build
            };
            let build_opts =
                commands::build_options(srcpkg, &input, &build, build_dep, isolated, &host);
            let (packages, file_lists) = match source {
                InstallSource::Build => (vec![], vec![]),
                _ => (
                    input
                        .input_files
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect(),
                    input.input_file_lists.clone(),
                ),
            };
            commands::cmd_install(&InstallOptions {
                source,
                packages,
                file_lists,
                build: build_opts,
                interactive: !yes,
            })
        }
        Commands::SystemSetup {
            isolated,
            distro,
            yes,
        } => commands::cmd_system_setup(isolated, distro.as_deref(), !yes, &host),
        Commands::Status => commands::cmd_status(&host),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
