// src/parse.rs

//! Archive file name grammar
//!
//! Archive names follow `<name><sep><version><ext>` where `sep` is `-` or
//! `_`, the version starts with an optional `v` followed by at least two
//! dot-separated numeric components, and `ext` is the archive extension
//! including a `.tar` prefix when present (`.tar.gz`, `.tar.xz`, ...).

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// name, separator, version (including any release suffix)
static RE_NVR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)([-_])(v?\d+(?:\.\d+)+(?:.+?)?)$").expect("valid NVR regex")
});

/// Parts of a parsed archive file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub name: String,
    pub sep: String,
    pub version: String,
    pub ext: String,
}

impl ArchiveName {
    /// Reassemble the file name, optionally with a different version
    pub fn file_name_with_version(&self, version: &str) -> String {
        format!("{}{}{}{}", self.name, self.sep, version, self.ext)
    }

    pub fn file_name(&self) -> String {
        self.file_name_with_version(&self.version)
    }
}

/// Split an archive file name into base name and extension such as `.tar.gz`
pub fn split_archive_ext(archive_fn: &str) -> (&str, &str) {
    let Some(dot) = archive_fn.rfind('.') else {
        return (archive_fn, "");
    };
    if dot == 0 {
        return (archive_fn, "");
    }
    let name = &archive_fn[..dot];
    if name.ends_with(".tar") {
        let tar = dot - ".tar".len();
        return (&archive_fn[..tar], &archive_fn[tar..]);
    }
    (name, &archive_fn[dot..])
}

/// Split an archive file name into name, separator, version and extension
pub fn split_archive_fn(archive_fn: &str) -> Result<ArchiveName> {
    let (base, ext) = split_archive_ext(archive_fn);
    let caps = RE_NVR.captures(base).ok_or_else(|| {
        Error::ParsingFailed(format!(
            "unable to parse version from archive file name: {archive_fn}"
        ))
    })?;
    Ok(ArchiveName {
        name: caps[1].to_string(),
        sep: caps[2].to_string(),
        version: caps[3].to_string(),
        ext: ext.to_string(),
    })
}

/// Parse a version from common version strings (`v1.2.3` -> `1.2.3`)
pub fn parse_version(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}
