// src/pipeline/setup.rs

//! Host setup and project status

use crate::distro::Distro;
use crate::error::Result;
use crate::pkgstyle::StyleRegistry;
use crate::project::Project;
use std::path::PathBuf;
use tracing::info;

/// Install the distro packages needed for packaging on this host
///
/// Returns the requested packages, empty when nothing is required.
pub fn system_setup(
    registry: &StyleRegistry,
    distro: &str,
    isolated: bool,
    interactive: bool,
) -> Result<Vec<String>> {
    info!("system setup for packaging");
    info!("target distro: {}", distro);

    let style = registry.for_distro(distro)?;
    info!("target pkgstyle: {}", style.name());

    let reqs = style.distro_requires().packages(isolated);
    if reqs.is_empty() {
        info!("no distro packages required");
    } else {
        style.install_distro_packages(&reqs, distro, interactive)?;
    }
    info!("system ready for packaging");
    Ok(reqs)
}

/// Snapshot of a project as seen from this host
#[derive(Debug, Clone)]
pub struct ProjectStatus {
    pub name: String,
    pub path: PathBuf,
    pub config_path: PathBuf,
    pub config_exists: bool,
    /// Host distro name and idver
    pub distro: String,
    pub distro_idver: String,
    /// Package style handling the host distro, if any
    pub style: Option<&'static str>,
    /// Template for the host distro, if any
    pub template: Option<PathBuf>,
    /// All discovered templates with their styles
    pub templates: Vec<(PathBuf, &'static str)>,
    pub cache_enabled: bool,
}

/// Gather project status for the given host distro
pub fn status(proj: &Project, host: &Distro) -> ProjectStatus {
    let idver = host.idver();
    let config_path = proj.config_path();
    ProjectStatus {
        name: proj.name().to_string(),
        path: proj.path().to_path_buf(),
        config_exists: config_path.exists(),
        config_path,
        distro: host.fullname(),
        style: proj.registry().for_distro(&idver).ok().map(|s| s.name()),
        template: proj
            .get_template_for_distro(&idver)
            .ok()
            .map(|t| t.path().to_path_buf()),
        templates: proj
            .templates()
            .iter()
            .map(|t| (t.path().to_path_buf(), t.style().name()))
            .collect(),
        cache_enabled: proj.cache_enabled(true),
        distro_idver: idver,
    }
}
