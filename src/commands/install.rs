// src/commands/install.rs
//! Package installation command

use super::open_project;
use anyhow::{Context, Result};
use apkg::pipeline::{self, InstallOptions};

/// Install packages using native package manager
pub fn cmd_install(opts: &InstallOptions) -> Result<()> {
    let mut proj = open_project()?;
    let installed = pipeline::install(&mut proj, opts).context("Failed to install packages")?;
    for pkg in &installed {
        println!("{}", pkg);
    }
    Ok(())
}
