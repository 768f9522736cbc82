// src/commands/build.rs
//! Package build command

use super::{open_project, print_results};
use crate::cli::{BuildInputArgs, InputArgs};
use anyhow::{Context, Result};
use apkg::distro::{Distro, distro_arg};
use apkg::pipeline::{self, BuildOptions};

/// Map command line arguments to build options
pub fn build_options(
    srcpkg: bool,
    input: &InputArgs,
    build: &BuildInputArgs,
    build_dep: bool,
    isolated: bool,
    host: &Distro,
) -> BuildOptions {
    BuildOptions {
        upstream: input.upstream,
        srcpkg,
        archive: input.archive,
        input_files: input.input_files.clone(),
        input_file_lists: input.input_file_lists.clone(),
        version: build.version.clone(),
        release: build.release.clone(),
        distro: distro_arg(build.distro.as_deref(), host),
        result_dir: build.result_dir.clone(),
        install_dep: build_dep,
        isolated,
        use_cache: build.cache.use_cache(),
    }
}

/// Build packages
pub fn cmd_build(opts: &BuildOptions) -> Result<()> {
    let mut proj = open_project()?;
    let pkgs = pipeline::build_package(&mut proj, opts).context("Failed to build packages")?;
    print_results(&pkgs);
    Ok(())
}
