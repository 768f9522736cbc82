// src/commands/srcpkg.rs
//! Source package command

use super::{open_project, print_results};
use crate::cli::{BuildInputArgs, InputArgs};
use anyhow::{Context, Result};
use apkg::distro::{Distro, distro_arg};
use apkg::pipeline::{self, SrcpkgOptions};

/// Create source package
pub fn cmd_srcpkg(
    input: &InputArgs,
    build: &BuildInputArgs,
    render_template: bool,
    host: &Distro,
) -> Result<()> {
    let mut proj = open_project()?;
    let opts = SrcpkgOptions {
        upstream: input.upstream,
        archive: input.archive,
        input_files: input.input_files.clone(),
        input_file_lists: input.input_file_lists.clone(),
        version: build.version.clone(),
        release: build.release.clone(),
        distro: distro_arg(build.distro.as_deref(), host),
        result_dir: build.result_dir.clone(),
        use_cache: build.cache.use_cache(),
        render_template,
    };
    let results =
        pipeline::make_srcpkg(&mut proj, &opts).context("Failed to create source package")?;
    print_results(&results);
    Ok(())
}
