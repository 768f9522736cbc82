// src/cli/mod.rs
//! CLI definitions for apkg
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Pipeline commands, in stage order:
//! - `make-archive` / `get-archive` - Create dev archive / download upstream archive
//! - `srcpkg` - Create source package
//! - `build-dep` - List or install build dependencies
//! - `build` - Build packages
//! - `install` - Install packages
//!
//! Host and project:
//! - `system-setup` - Install packages needed for packaging
//! - `status` - Show project status

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod input;

pub use input::{BuildInputArgs, CacheArgs, InputArgs};

#[derive(Parser)]
#[command(name = "apkg")]
#[command(version)]
#[command(about = "Upstream packaging automation for deb, rpm, arch and nix", long_about = None)]
pub struct Cli {
    /// Log level: debug, verbose, info, brief, quiet
    #[arg(short = 'L', long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Verbose,
    Info,
    Brief,
    Quiet,
}

impl LogLevel {
    /// tracing filter level
    pub fn filter(&self) -> &'static str {
        match self {
            Self::Debug => "trace",
            Self::Verbose => "debug",
            Self::Info => "info",
            Self::Brief => "warn",
            Self::Quiet => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create dev archive from current project state
    ///
    /// Runs project.make_archive_script and copies the archive it reports
    /// on the last stdout line into pkg/archives/dev.
    MakeArchive(ArchiveArgs),

    /// Download upstream archive for current project
    ///
    /// Uses upstream.archive_url (and upstream.signature_url if set). The
    /// version is detected automatically unless given.
    GetArchive(ArchiveArgs),

    /// Create source package
    Srcpkg {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        build: BuildInputArgs,

        /// Only render package template, don't build source package
        #[arg(long)]
        render_template: bool,
    },

    /// Build packages
    Build {
        /// Input files are source packages
        #[arg(short, long, conflicts_with = "archive")]
        srcpkg: bool,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        build: BuildInputArgs,

        /// Install build deps on host before building
        #[arg(short = 'b', long)]
        build_dep: bool,

        /// Build in an isolated environment (pbuilder, mock)
        #[arg(short, long)]
        isolated: bool,
    },

    /// List or install build dependencies
    BuildDep {
        /// Input files are source packages (build one if none given)
        #[arg(short, long, conflicts_with = "archive")]
        srcpkg: bool,

        #[command(flatten)]
        input: InputArgs,

        /// Target distro (default: current distro)
        #[arg(short, long)]
        distro: Option<String>,

        /// List build deps only, don't install them
        #[arg(long)]
        list: bool,

        /// Non-interactive mode
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Install packages using native package manager
    ///
    /// Builds packages and installs them unless -C or -D is given. Use
    /// "-l -" to read packages from stdin, which implies --yes.
    Install {
        /// Install local package files
        #[arg(short = 'C', long, conflicts_with = "distro_pkgs")]
        custom_pkgs: bool,

        /// Install packages from distro repos
        #[arg(short = 'D', long)]
        distro_pkgs: bool,

        /// Input files are source packages
        #[arg(short, long, conflicts_with = "archive")]
        srcpkg: bool,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        build: BuildInputArgs,

        /// Install build deps on host before building
        #[arg(short = 'b', long)]
        build_dep: bool,

        /// Build in an isolated environment (pbuilder, mock)
        #[arg(short, long)]
        isolated: bool,

        /// Non-interactive mode
        #[arg(short, long)]
        yes: bool,
    },

    /// Install distro packages required for packaging
    SystemSetup {
        /// Also install packages needed for isolated builds
        #[arg(short = 'I', long)]
        isolated: bool,

        /// Target distro (default: current distro)
        #[arg(short, long)]
        distro: Option<String>,

        /// Non-interactive mode
        #[arg(short, long)]
        yes: bool,
    },

    /// Show status of current project
    Status,
}

#[derive(Args)]
pub struct ArchiveArgs {
    /// Archive version
    #[arg(short, long)]
    pub version: Option<String>,

    /// Put results into specified directory
    #[arg(short = 'O', long)]
    pub result_dir: Option<PathBuf>,

    #[command(flatten)]
    pub cache: CacheArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "apkg", "build", "-u", "-d", "debian-12", "-r", "2", "-i", "--no-cache",
        ])
        .unwrap();
        let Commands::Build { input, build, isolated, srcpkg, .. } = cli.command else {
            panic!("expected build command");
        };
        assert!(input.upstream);
        assert!(isolated);
        assert!(!srcpkg);
        assert_eq!(build.distro.as_deref(), Some("debian-12"));
        assert_eq!(build.release.as_deref(), Some("2"));
        assert!(!build.cache.use_cache());
    }

    #[test]
    fn test_srcpkg_and_archive_conflict() {
        let res = Cli::try_parse_from(["apkg", "build", "-s", "-a", "foo.dsc"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::try_parse_from(["apkg", "status", "-L", "verbose"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Verbose);
        assert_eq!(cli.log_level.filter(), "debug");
    }
}
