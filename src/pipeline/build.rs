// src/pipeline/build.rs

//! Package stage
//!
//! Builds binary packages from a source package, creating the source
//! package first unless one is supplied.

use super::common::{
    ensure_input_files, ensure_results, ensure_srcpkg_files, get_cached_paths, parse_input_files,
};
use super::deps::{BuildDepOptions, build_dep};
use super::srcpkg::{SrcpkgOptions, make_srcpkg};
use crate::error::{Error, Result};
use crate::fsutil::{recreate_dir, remove_dir};
use crate::hash::file_checksum;
use crate::project::Project;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub upstream: bool,
    /// Input files are source packages
    pub srcpkg: bool,
    /// Input files are archives
    pub archive: bool,
    pub input_files: Vec<PathBuf>,
    pub input_file_lists: Vec<PathBuf>,
    pub version: Option<String>,
    pub release: Option<String>,
    /// Target distro in idver format
    pub distro: String,
    pub result_dir: Option<PathBuf>,
    /// Install build deps before building
    pub install_dep: bool,
    /// Build in an isolated environment (pbuilder, mock)
    pub isolated: bool,
    pub use_cache: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            upstream: false,
            srcpkg: false,
            archive: false,
            input_files: vec![],
            input_file_lists: vec![],
            version: None,
            release: None,
            distro: String::new(),
            result_dir: None,
            install_dep: false,
            isolated: false,
            use_cache: true,
        }
    }
}

/// Build packages for the target distro
pub fn build_package(proj: &mut Project, opts: &BuildOptions) -> Result<Vec<PathBuf>> {
    info!("building package");
    let distro = opts.distro.as_str();
    info!("target distro: {}", distro);

    let srcpkgs = if opts.srcpkg {
        let srcpkgs = parse_input_files(&opts.input_files, &opts.input_file_lists)?;
        ensure_srcpkg_files(&srcpkgs)?;
        srcpkgs
    } else {
        let srcpkg_opts = SrcpkgOptions {
            upstream: opts.upstream,
            archive: opts.archive,
            input_files: opts.input_files.clone(),
            input_file_lists: opts.input_file_lists.clone(),
            version: opts.version.clone(),
            release: opts.release.clone(),
            distro: distro.to_string(),
            result_dir: None,
            use_cache: opts.use_cache,
            render_template: false,
        };
        make_srcpkg(proj, &srcpkg_opts)?
    };
    ensure_input_files(&srcpkgs)?;
    let srcpkg = srcpkgs[0].clone();
    if opts.srcpkg {
        info!("using existing source package: {}", srcpkg.display());
    }

    let use_cache = proj.cache_enabled(opts.use_cache);
    let cache_name = format!("pkg/{distro}");
    let cache_key = if use_cache {
        file_checksum(&srcpkg)?
    } else {
        String::new()
    };
    let result_dir = opts.result_dir.as_deref();
    if use_cache && let Some(cached) = get_cached_paths(proj, &cache_name, &cache_key, result_dir)? {
        info!("reuse {} cached packages", cached.len());
        return Ok(cached);
    }

    if opts.install_dep {
        if opts.isolated {
            // isolated builders resolve deps themselves
            warn!("ignoring request to install deps in isolated build");
        } else {
            let dep_opts = BuildDepOptions {
                srcpkg: true,
                input_files: vec![srcpkg.clone()],
                distro: distro.to_string(),
                use_cache: opts.use_cache,
                ..Default::default()
            };
            match build_dep(proj, &dep_opts) {
                Ok(_) => {}
                Err(e @ Error::DistroNotSupported(_)) => warn!("{} - SKIPPING", e),
                Err(e) => return Err(e),
            }
        }
    }

    let style = Arc::clone(proj.get_template_for_distro(distro)?.style());
    let nvr = style.srcpkg_nvr(&srcpkg)?;
    let build_path = proj.package_build_path().join(distro).join(&nvr);
    let out_path = opts
        .result_dir
        .clone()
        .unwrap_or_else(|| proj.package_out_path().join(distro).join(&nvr));
    info!("source package NVR: {}", nvr);
    info!("build dir: {}", build_path.display());
    info!("result dir: {}", out_path.display());

    recreate_dir(&build_path, "build dir")?;
    if opts.result_dir.is_none() {
        remove_dir(&out_path, "result dir")?;
    }

    let pkgs = style.build_packages(&build_path, &out_path, &srcpkgs, opts.isolated)?;
    ensure_results(&pkgs, "package", &out_path)?;
    info!("built {} packages in: {}", pkgs.len(), out_path.display());

    // upstream builds are not cached
    if use_cache && !opts.upstream {
        proj.cache().update(&cache_name, &cache_key, &pkgs)?;
    }
    Ok(pkgs)
}
