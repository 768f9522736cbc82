// src/commands/archive.rs
//! Archive commands: make-archive, get-archive

use super::{open_project, print_results};
use crate::cli::ArchiveArgs;
use anyhow::{Context, Result};
use apkg::pipeline::{self, ArchiveOptions};

fn archive_options(args: &ArchiveArgs) -> ArchiveOptions {
    ArchiveOptions {
        version: args.version.clone(),
        result_dir: args.result_dir.clone(),
        use_cache: args.cache.use_cache(),
    }
}

/// Create dev archive from current project state
pub fn cmd_make_archive(args: &ArchiveArgs) -> Result<()> {
    let mut proj = open_project()?;
    let results = pipeline::make_archive(&mut proj, &archive_options(args))
        .context("Failed to create dev archive")?;
    print_results(&results);
    Ok(())
}

/// Download upstream archive
pub fn cmd_get_archive(args: &ArchiveArgs) -> Result<()> {
    let mut proj = open_project()?;
    let results = pipeline::get_archive(&mut proj, &archive_options(args))
        .context("Failed to get upstream archive")?;
    print_results(&results);
    Ok(())
}
