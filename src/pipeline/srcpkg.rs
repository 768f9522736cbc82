// src/pipeline/srcpkg.rs

//! Source package stage
//!
//! Turns an archive into a distro source package by rendering the package
//! template for the target distro and handing it to the template's
//! package style. In upstream mode the template is read from the `distro/`
//! directory shipped inside the upstream archive.

use super::archive::{ArchiveOptions, find_archive, get_archive, get_archive_version, make_archive};
use super::common::{ensure_input_files, ensure_results, get_cached_paths, parse_input_files};
use crate::archive::unpack_archive;
use crate::error::Result;
use crate::fsutil::{recreate_dir, remove_dir};
use crate::hash::file_checksum;
use crate::project::{INPUT_BASE_DIR, Project};
use crate::template::TemplateEnv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Package release used when none is requested
pub const DEFAULT_RELEASE: &str = "1";

#[derive(Debug, Clone)]
pub struct SrcpkgOptions {
    /// Use an upstream archive instead of a dev one
    pub upstream: bool,
    /// Use the archive given in the input files instead of creating one
    pub archive: bool,
    pub input_files: Vec<PathBuf>,
    pub input_file_lists: Vec<PathBuf>,
    pub version: Option<String>,
    pub release: Option<String>,
    /// Target distro in idver format
    pub distro: String,
    pub result_dir: Option<PathBuf>,
    pub use_cache: bool,
    /// Only render the package template, don't build a source package
    pub render_template: bool,
}

impl Default for SrcpkgOptions {
    fn default() -> Self {
        Self {
            upstream: false,
            archive: false,
            input_files: vec![],
            input_file_lists: vec![],
            version: None,
            release: None,
            distro: String::new(),
            result_dir: None,
            use_cache: true,
            render_template: false,
        }
    }
}

/// Create a source package for the target distro
pub fn make_srcpkg(proj: &mut Project, opts: &SrcpkgOptions) -> Result<Vec<PathBuf>> {
    let srcpkg_type = if opts.upstream { "upstream" } else { "dev" };
    if opts.render_template {
        info!("rendering {} source package template", srcpkg_type);
    } else {
        info!("creating {} source package", srcpkg_type);
    }
    let distro = opts.distro.as_str();
    info!("target distro: {}", distro);
    let release = opts.release.as_deref().unwrap_or(DEFAULT_RELEASE);

    let archives = if opts.archive {
        let infiles = parse_input_files(&opts.input_files, &opts.input_file_lists)?;
        let mut archives = Vec::with_capacity(infiles.len());
        for infile in &infiles {
            archives.push(find_archive(proj, infile, opts.upstream)?);
        }
        archives
    } else {
        let ar_opts = ArchiveOptions {
            version: opts.version.clone(),
            result_dir: None,
            use_cache: opts.use_cache,
        };
        if opts.upstream {
            get_archive(proj, &ar_opts)?
        } else {
            make_archive(proj, &ar_opts)?
        }
    };
    ensure_input_files(&archives)?;
    let archive = archives[0].clone();
    let version = get_archive_version(&archive, opts.version.as_deref())?;

    let use_cache = proj.cache_enabled(opts.use_cache) && !opts.render_template;
    let cache_name = format!("srcpkg/{srcpkg_type}/{distro}");
    let cache_key = match (use_cache, opts.upstream) {
        (false, _) => String::new(),
        (true, true) => file_checksum(&archive)?,
        (true, false) => proj.checksum()?.unwrap_or_default().to_string(),
    };
    let result_dir = opts.result_dir.as_deref();
    if use_cache && let Some(cached) = get_cached_paths(proj, &cache_name, &cache_key, result_dir)? {
        info!("reuse cached source package: {}", cached[0].display());
        return Ok(cached);
    }

    if opts.upstream {
        info!("unpacking upstream archive: {}", archive.display());
        let unpacked = unpack_archive(&archive, &proj.unpacked_archive_path())?;
        let input_path = unpacked.join(INPUT_BASE_DIR);
        info!("loading upstream project input: {}", input_path.display());
        proj.load_input(input_path)?;
    }

    let template = proj.get_template_for_distro(distro)?.clone();
    let style = Arc::clone(template.style());
    info!("package style: {}", style.name());
    info!("package template: {}", template.path().display());
    info!("package archive: {}", archive.display());

    let name = template.name()?;
    let nvr = format!("{name}-{version}-{release}");
    let build_path = proj.srcpkg_build_path().join(distro).join(&nvr);
    let out_path = opts
        .result_dir
        .clone()
        .unwrap_or_else(|| proj.srcpkg_out_path().join(distro).join(&nvr));
    info!("package NVR: {}", nvr);
    info!("build dir: {}", build_path.display());
    info!("result dir: {}", out_path.display());

    recreate_dir(&build_path, "build dir")?;
    if opts.result_dir.is_none() {
        remove_dir(&out_path, "result dir")?;
    }

    let env = TemplateEnv {
        name,
        version,
        release: release.to_string(),
        nvr,
        distro: distro.to_string(),
        ..Default::default()
    };

    if opts.render_template {
        let render_path = if opts.result_dir.is_some() {
            &out_path
        } else {
            &build_path
        };
        template.render(render_path, &env)?;
        info!("rendered source package template: {}", render_path.display());
        return Ok(vec![render_path.clone()]);
    }

    let results = style.build_srcpkg(&build_path, &out_path, &archives, &template, &env)?;
    ensure_results(&results, "source package", &out_path)?;
    info!("made source package: {}", results[0].display());

    if use_cache {
        proj.cache().update(&cache_name, &cache_key, &results)?;
    }
    Ok(results)
}
