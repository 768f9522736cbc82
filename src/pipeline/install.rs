// src/pipeline/install.rs

//! Install stage

use super::build::{BuildOptions, build_package};
use super::common::read_file_lists;
use crate::error::{Error, Result};
use crate::project::Project;
use std::path::PathBuf;
use tracing::info;

/// Where packages to install come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstallSource {
    /// Build packages from the project, then install them
    #[default]
    Build,
    /// Local package files
    Custom,
    /// Package names from distro repositories
    Distro,
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub source: InstallSource,
    /// Package files or names for custom and distro installs
    pub packages: Vec<String>,
    /// Files listing packages, one per line, `-` for stdin
    pub file_lists: Vec<PathBuf>,
    /// Build options, also carrying the target distro
    pub build: BuildOptions,
    pub interactive: bool,
}

/// Install packages using the native package manager
///
/// Returns the installed package files or names.
pub fn install(proj: &mut Project, opts: &InstallOptions) -> Result<Vec<String>> {
    info!("installing packages");
    let distro = opts.build.distro.as_str();
    info!("target distro: {}", distro);

    let style = proj.registry().for_distro(distro)?;
    info!("target pkgstyle: {}", style.name());

    if opts.source == InstallSource::Build {
        let pkgs = build_package(proj, &opts.build)?;
        style.install_custom_packages(&pkgs, distro, opts.interactive)?;
        info!("installed {} packages", pkgs.len());
        return Ok(pkgs.iter().map(|p| p.display().to_string()).collect());
    }

    let (listed, from_stdin) = read_file_lists(&opts.file_lists)?;
    // no interactive input possible when packages come from stdin
    let interactive = opts.interactive && !from_stdin;
    let packages: Vec<String> = opts.packages.iter().cloned().chain(listed).collect();
    if packages.is_empty() {
        return Err(Error::InvalidInput("no packages specified".to_string()));
    }

    match opts.source {
        InstallSource::Distro => style.install_distro_packages(&packages, distro, interactive)?,
        _ => {
            let files: Vec<PathBuf> = packages.iter().map(PathBuf::from).collect();
            style.install_custom_packages(&files, distro, interactive)?;
        }
    }
    info!("installed {} packages", packages.len());
    Ok(packages)
}
