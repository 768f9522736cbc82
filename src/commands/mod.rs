// src/commands/mod.rs
//! Command handlers for the apkg CLI

mod archive;
mod build;
mod build_dep;
mod install;
mod srcpkg;
mod system;

pub use archive::{cmd_get_archive, cmd_make_archive};
pub use build::{build_options, cmd_build};
pub use build_dep::cmd_build_dep;
pub use install::cmd_install;
pub use srcpkg::cmd_srcpkg;
pub use system::{cmd_status, cmd_system_setup};

use anyhow::{Context, Result};
use apkg::Project;
use std::path::PathBuf;

/// Load the project in the current directory
fn open_project() -> Result<Project> {
    Project::load(".").context("Failed to load project")
}

/// Print stage results, one per line
fn print_results(results: &[PathBuf]) {
    for result in results {
        println!("{}", result.display());
    }
}
