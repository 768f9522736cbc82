// src/pipeline/deps.rs

//! Build dependency stage

use super::archive::{ArchiveOptions, get_archive};
use super::common::{ensure_input_files, ensure_srcpkg_files, parse_input_files};
use super::srcpkg::{SrcpkgOptions, make_srcpkg};
use crate::archive::unpack_archive;
use crate::error::Result;
use crate::project::Project;
use crate::version::Dependency;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct BuildDepOptions {
    pub upstream: bool,
    /// Read deps from a source package instead of the template
    pub srcpkg: bool,
    /// Input files are archives
    pub archive: bool,
    pub input_files: Vec<PathBuf>,
    pub input_file_lists: Vec<PathBuf>,
    /// Target distro in idver format
    pub distro: String,
    /// Only list deps, don't install them
    pub list_only: bool,
    pub interactive: bool,
    pub use_cache: bool,
}

impl Default for BuildDepOptions {
    fn default() -> Self {
        Self {
            upstream: false,
            srcpkg: false,
            archive: false,
            input_files: vec![],
            input_file_lists: vec![],
            distro: String::new(),
            list_only: false,
            interactive: false,
            use_cache: true,
        }
    }
}

/// List or install build dependencies for the target distro
///
/// Returns the dependencies found.
pub fn build_dep(proj: &mut Project, opts: &BuildDepOptions) -> Result<Vec<Dependency>> {
    let action = if opts.list_only { "listing" } else { "installing" };
    info!("{} build deps", action);
    let distro = opts.distro.as_str();
    info!("target distro: {}", distro);

    let template = proj.get_template_for_distro(distro)?.clone();
    let style = Arc::clone(template.style());
    let infiles = parse_input_files(&opts.input_files, &opts.input_file_lists)?;

    let deps = if opts.srcpkg {
        let srcpkgs = if opts.archive || infiles.is_empty() {
            let srcpkg_opts = SrcpkgOptions {
                upstream: opts.upstream,
                archive: opts.archive,
                input_files: infiles,
                distro: distro.to_string(),
                use_cache: opts.use_cache,
                ..Default::default()
            };
            make_srcpkg(proj, &srcpkg_opts)?
        } else {
            ensure_srcpkg_files(&infiles)?;
            infiles
        };
        ensure_input_files(&srcpkgs)?;
        info!("build deps from srcpkg: {}", srcpkgs[0].display());
        style.build_deps_from_srcpkg(&srcpkgs[0], distro)?
    } else {
        let archives = if opts.upstream {
            let ar_opts = ArchiveOptions {
                use_cache: opts.use_cache,
                ..Default::default()
            };
            Some(get_archive(proj, &ar_opts)?)
        } else if opts.archive {
            Some(infiles)
        } else {
            None
        };

        let template_path = match archives {
            Some(archives) => {
                ensure_input_files(&archives)?;
                info!("unpacking archive: {}", archives[0].display());
                let unpacked = unpack_archive(&archives[0], &proj.unpacked_archive_path())?;
                info!("loading template from archive: {}", unpacked.display());
                let archive_proj = Project::with_registry(&unpacked, Arc::clone(proj.registry()))?;
                archive_proj.get_template_for_distro(distro)?.path().to_path_buf()
            }
            None => template.path().to_path_buf(),
        };
        info!("build deps from template: {}", template_path.display());
        style.build_deps_from_template(&template_path, distro)?
    };

    if opts.list_only {
        return Ok(deps);
    }

    info!("installing {} build deps", deps.len());
    style.install_build_deps(&deps, distro, opts.interactive)?;
    Ok(deps)
}
