// src/commands/build_dep.rs
//! Build dependency command

use super::open_project;
use anyhow::{Context, Result};
use apkg::pipeline::{self, BuildDepOptions};

/// List or install build deps
pub fn cmd_build_dep(opts: &BuildDepOptions) -> Result<()> {
    let mut proj = open_project()?;
    let deps = pipeline::build_dep(&mut proj, opts).context("Failed to process build deps")?;
    if opts.list_only {
        for dep in &deps {
            println!("{}", dep);
        }
    }
    Ok(())
}
