// src/pipeline/archive.rs

//! Archive stage
//!
//! Dev archives are produced from the working tree by the project's
//! `make_archive_script`; upstream archives are downloaded from the
//! configured `upstream.archive_url`.

use super::common::get_cached_paths;
use crate::error::{Error, Result};
use crate::fsutil::copy_file;
use crate::parse::{parse_version, split_archive_fn};
use crate::pkgstyle::file_name;
use crate::project::Project;
use crate::run::Cmd;
use crate::upstream::HttpClient;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CACHE_DEV: &str = "archive/dev";
const CACHE_UPSTREAM: &str = "archive/upstream";

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Requested archive version
    pub version: Option<String>,
    /// Copy results here instead of the project archive dir
    pub result_dir: Option<PathBuf>,
    pub use_cache: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            version: None,
            result_dir: None,
            use_cache: true,
        }
    }
}

fn archive_kind(upstream: bool) -> &'static str {
    if upstream { "upstream" } else { "dev" }
}

/// Create a dev archive from the current project state
pub fn make_archive(proj: &mut Project, opts: &ArchiveOptions) -> Result<Vec<PathBuf>> {
    info!("creating dev archive");

    let use_cache = proj.cache_enabled(opts.use_cache);
    let cache_key = if use_cache {
        proj.checksum()?.unwrap_or_default().to_string()
    } else {
        String::new()
    };
    let result_dir = opts.result_dir.as_deref();
    if use_cache && let Some(cached) = get_cached_paths(proj, CACHE_DEV, &cache_key, result_dir)? {
        info!("reuse cached archive: {}", cached[0].display());
        return Ok(cached);
    }

    let script = proj
        .config_script("project.make_archive_script")
        .ok_or_else(|| proj.missing_option("project.make_archive_script"))?;
    info!("running make_archive_script: {}", script.display());
    let out = Cmd::new(&script).cwd(proj.path()).output()?;

    // last stdout line is the path to the resulting archive
    let in_archive = out
        .last_line()
        .map(|l| proj.path().join(l.trim()))
        .filter(|p| p.is_file())
        .ok_or_else(|| {
            Error::UnexpectedCommandOutput(format!(
                "make_archive_script finished successfully but the archive \
                 (indicated by last script stdout line) doesn't exist:\n\n{}",
                out.last_line().unwrap_or_default()
            ))
        })?;
    info!("archive created: {}", in_archive.display());

    let out_dir = opts
        .result_dir
        .clone()
        .unwrap_or_else(|| proj.dev_archive_path());
    let mut archive_fn = file_name(&in_archive)?.to_string();
    if let Some(version) = &opts.version {
        let parsed = split_archive_fn(&archive_fn)?;
        if parse_version(&parsed.version) != version {
            archive_fn = parsed.file_name_with_version(version);
            info!("archive renamed to match requested version: {}", archive_fn);
        }
    }
    let archive = out_dir.join(&archive_fn);
    info!("copying archive to: {}", archive.display());
    copy_file(&in_archive, &archive)?;
    info!("made archive: {}", archive.display());

    let results = vec![archive];
    if use_cache {
        proj.cache().update(CACHE_DEV, &cache_key, &results)?;
    }
    Ok(results)
}

/// Download an upstream archive and its signature when configured
pub fn get_archive(proj: &mut Project, opts: &ArchiveOptions) -> Result<Vec<PathBuf>> {
    let version = match &opts.version {
        Some(v) => v.clone(),
        None => proj
            .upstream_version()?
            .map(ToString::to_string)
            .ok_or(Error::UnableToDetectUpstreamVersion)?,
    };
    let url = proj
        .upstream_archive_url(&version)?
        .ok_or_else(|| proj.missing_option("upstream.archive_url"))?;

    let use_cache = proj.cache_enabled(opts.use_cache);
    let result_dir = opts.result_dir.as_deref();
    if use_cache && let Some(cached) = get_cached_paths(proj, CACHE_UPSTREAM, &url, result_dir)? {
        info!("reuse cached archive: {}", cached[0].display());
        return Ok(cached);
    }

    let out_dir = opts
        .result_dir
        .clone()
        .unwrap_or_else(|| proj.upstream_archive_path());
    fs::create_dir_all(&out_dir)?;

    let client = HttpClient::new()?;
    let archive = client.download_archive(&url, &out_dir)?;
    info!("downloaded archive: {}", archive.display());
    let mut results = vec![archive];

    match proj.upstream_signature_url(&version)? {
        Some(signature_url) => {
            let signature = client.download_file(&signature_url, &out_dir)?;
            info!("downloaded signature: {}", signature.display());
            results.push(signature);
        }
        None => debug!("upstream.signature_url not set, skipping signature download"),
    }

    if use_cache {
        proj.cache().update(CACHE_UPSTREAM, &url, &results)?;
    }
    Ok(results)
}

/// Resolve an archive given by path, or by name within the project archives
pub fn find_archive(proj: &Project, archive: &Path, upstream: bool) -> Result<PathBuf> {
    if archive.exists() {
        return Ok(archive.to_path_buf());
    }
    let kind = archive_kind(upstream);
    let name = archive.to_string_lossy().into_owned();
    let mut found = proj.find_archives_by_name(&name, upstream)?;
    match found.len() {
        0 => Err(Error::ArchiveNotFound { kind, name }),
        1 => {
            let path = found.remove(0);
            debug!("found {} archive: {}", kind, path.display());
            Ok(path)
        }
        _ => {
            let listing: Vec<String> = found.iter().map(|p| p.display().to_string()).collect();
            Err(Error::ArchiveNotFound {
                kind,
                name: format!(
                    "{name}\n\nmultiple matching archives found, not sure which one to use:\n\n{}",
                    listing.join("\n")
                ),
            })
        }
    }
}

/// Version of an archive from its file name
///
/// When `version` is given, the archive version must match it.
pub fn get_archive_version(archive: &Path, version: Option<&str>) -> Result<String> {
    let parsed = split_archive_fn(file_name(archive)?)?;
    let archive_version = parse_version(&parsed.version);
    match version {
        Some(v) if v != archive_version => Err(Error::InvalidVersion(format!(
            "archive name doesn't match desired version: {}\n\n\
             desired version: {v}\narchive version: {archive_version}",
            archive.display()
        ))),
        Some(v) => {
            debug!("archive name matches desired version: {}", v);
            Ok(v.to_string())
        }
        None => Ok(archive_version.to_string()),
    }
}
