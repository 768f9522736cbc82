// src/pkgstyle/deb.rs

//! `deb` package style for Debian, Ubuntu and their many clones
//!
//! Template: a directory containing `debian/{control,rules,changelog}`,
//! rendered into the root of the unpacked source archive.
//!
//! Source package: `.dsc` + `.orig.tar.*` + `.debian.tar.*` built by
//! `dpkg-source -b`. Packages are built by `dpkg-buildpackage` on the host
//! or by `pbuilder` in a chroot for isolated builds.

use super::{DistroRequires, PackageStyle, direct_output, file_name, first_srcpkg};
use crate::archive::unpack_archive;
use crate::error::{Error, Result};
use crate::fsutil::{copy_file, copy_into, files_matching};
use crate::parse::split_archive_fn;
use crate::run::Cmd;
use crate::template::{PackageTemplate, TemplateEnv};
use crate::version::{Dependency, Version};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

const BUILD_DEPENDS_FIELDS: &[&str] = &["Build-Depends", "Build-Depends-Indep", "Build-Depends-Arch"];

/// Architecture restrictions `[amd64]` and build profiles `<!nocheck>`
static RE_RESTRICTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]|\s<[!a-z][^>]*>").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct Deb;

impl PackageStyle for Deb {
    fn name(&self) -> &'static str {
        "deb"
    }

    fn supported_distros(&self) -> &'static [&'static str] {
        &["debian", "ubuntu", "linuxmint", "raspbian", "pop", "elementary"]
    }

    fn distro_requires(&self) -> DistroRequires {
        DistroRequires {
            core: &["build-essential", "devscripts", "dpkg-dev", "debhelper", "fakeroot"],
            isolated: &["pbuilder"],
        }
    }

    fn is_valid_template(&self, path: &Path) -> bool {
        let debian = path.join("debian");
        ["control", "rules", "changelog"]
            .iter()
            .all(|f| debian.join(f).exists())
    }

    fn template_name(&self, path: &Path) -> Result<String> {
        let control = path.join("debian").join("control");
        let text = fs::read_to_string(&control)?;
        control_fields(&text)
            .remove("Source")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::ParsingFailed(format!("unable to determine Source from: {}", control.display()))
            })
    }

    fn srcpkg_nvr(&self, srcpkg: &Path) -> Result<String> {
        let name = file_name(srcpkg)?;
        let base = name.strip_suffix(".dsc").ok_or_else(|| {
            Error::InvalidSourcePackageFormat(format!("deb source package must be .dsc but got: {name}"))
        })?;
        Ok(base.replacen('_', "-", 1))
    }

    fn build_srcpkg(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        archives: &[PathBuf],
        template: &PackageTemplate,
        env: &TemplateEnv,
    ) -> Result<Vec<PathBuf>> {
        let archive = archives
            .first()
            .ok_or_else(|| Error::InvalidInput("no archive specified".to_string()))?;
        let parts = split_archive_fn(file_name(archive)?)?;

        info!("unpacking archive: {}", archive.display());
        let source_dir = unpack_archive(archive, build_dir)?;
        template.render(&source_dir, env)?;

        let orig_name = format!("{}_{}.orig{}", env.name, env.version, parts.ext);
        let orig = build_dir.join(&orig_name);
        copy_file(archive, &orig)?;
        // detached upstream signature travels with the orig tarball
        for signature in archives.iter().skip(1) {
            if file_name(signature)?.ends_with(".asc") {
                copy_file(signature, &build_dir.join(format!("{orig_name}.asc")))?;
            }
        }

        let source_name = file_name(&source_dir)?;
        info!("building deb source package: {}", source_dir.display());
        Cmd::new("dpkg-source")
            .args(["-b", source_name])
            .cwd(build_dir)
            .output()?;

        let dsc = files_matching(build_dir, |n| n.ends_with(".dsc"))?;
        let [dsc] = dsc.as_slice() else {
            return Err(Error::UnexpectedCommandOutput(format!(
                "dpkg-source should produce a single .dsc but got {} in: {}",
                dsc.len(),
                build_dir.display()
            )));
        };
        let rest = files_matching(build_dir, |n| {
            n.contains(".orig.tar.") || n.contains(".debian.tar.") || n.ends_with(".diff.gz")
        })?;

        info!("copying source package to result dir: {}", out_dir.display());
        fs::create_dir_all(out_dir)?;
        let mut results = vec![copy_into(dsc, out_dir)?];
        for path in &rest {
            results.push(copy_into(path, out_dir)?);
        }
        Ok(results)
    }

    fn build_packages(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        srcpkgs: &[PathBuf],
        isolated: bool,
    ) -> Result<Vec<PathBuf>> {
        let dsc = first_srcpkg(srcpkgs)?;
        if !file_name(dsc)?.ends_with(".dsc") {
            return Err(Error::InvalidSourcePackageFormat(format!(
                "deb source package must be .dsc but got: {}",
                dsc.display()
            )));
        }
        let dsc = fs::canonicalize(dsc)?;
        fs::create_dir_all(build_dir)?;
        fs::create_dir_all(out_dir)?;

        if isolated {
            info!("starting isolated deb build using pbuilder");
            Cmd::sudo("pbuilder")
                .arg("build")
                .arg("--buildresult")
                .arg(out_dir)
                .arg(&dsc)
                .direct(direct_output())
                .output()?;
            return files_matching(out_dir, is_binary_package);
        }

        let source_dir = build_dir.join("source");
        info!("unpacking source package: {}", dsc.display());
        Cmd::new("dpkg-source")
            .arg("-x")
            .arg(&dsc)
            .arg(&source_dir)
            .output()?;

        info!("starting direct host deb build using dpkg-buildpackage");
        Cmd::new("dpkg-buildpackage")
            .args(["-us", "-uc", "-b"])
            .cwd(&source_dir)
            .direct(direct_output())
            .output()?;

        info!("copying built packages to result dir: {}", out_dir.display());
        files_matching(build_dir, is_binary_package)?
            .iter()
            .map(|p| copy_into(p, out_dir))
            .collect()
    }

    fn install_custom_packages(&self, packages: &[PathBuf], _distro: &str, interactive: bool) -> Result<()> {
        // apt treats bare names as repo packages, local files need a path
        let args = packages.iter().map(|p| {
            if p.is_absolute() || p.starts_with(".") {
                p.clone()
            } else {
                Path::new(".").join(p)
            }
        });
        apt_get("install", interactive).args(args).direct(true).output()?;
        Ok(())
    }

    fn install_distro_packages(&self, packages: &[String], _distro: &str, interactive: bool) -> Result<()> {
        apt_get("install", interactive).args(packages).direct(true).output()?;
        Ok(())
    }

    fn build_deps_from_template(&self, template: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        let control = template.join("debian").join("control");
        build_deps_from_control(&fs::read_to_string(&control)?)
    }

    fn build_deps_from_srcpkg(&self, srcpkg: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        build_deps_from_control(&fs::read_to_string(srcpkg)?)
    }

    fn install_build_deps(&self, deps: &[Dependency], _distro: &str, interactive: bool) -> Result<()> {
        if apt_supports_satisfy()? {
            let relations: Vec<String> = deps.iter().map(Dependency::to_deb).collect();
            apt_get("satisfy", interactive).args(&relations).direct(true).output()?;
        } else {
            // old apt can't resolve version constraints itself
            let names: Vec<String> = deps.iter().map(|d| d.name_only().to_string()).collect();
            apt_get("install", interactive).args(&names).direct(true).output()?;
        }
        Ok(())
    }
}

fn is_binary_package(name: &str) -> bool {
    name.ends_with(".deb") || name.ends_with(".udeb") || name.ends_with(".ddeb")
}

fn apt_get(action: &str, interactive: bool) -> Cmd {
    let cmd = Cmd::sudo("apt-get").arg(action);
    if interactive { cmd } else { cmd.arg("-y") }
}

/// `apt-get satisfy` exists since apt 2.0
fn apt_supports_satisfy() -> Result<bool> {
    let out = Cmd::new("apt-get").arg("--version").log_cmd(false).output()?;
    let version = out
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|v| Version::parse(v).ok());
    debug!("apt version: {:?}", version);
    let satisfy_since = Version::parse("2.0")?;
    Ok(version.is_some_and(|v| v >= satisfy_since))
}

/// Fields of a deb822 document (first occurrence wins)
pub(crate) fn control_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let mut current: Option<(String, String)> = None;
    for line in text.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = current.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((key, value)) = current.take() {
            fields.entry(key).or_insert(value);
        }
        if let Some((key, value)) = line.split_once(':')
            && !key.is_empty()
            && !key.contains(char::is_whitespace)
        {
            current = Some((key.to_string(), value.trim().to_string()));
        }
    }
    if let Some((key, value)) = current {
        fields.entry(key).or_insert(value);
    }
    fields
}

/// Parse `Build-Depends*` relations, taking the first of any alternatives
pub(crate) fn build_deps_from_control(text: &str) -> Result<Vec<Dependency>> {
    let fields = control_fields(text);
    let mut deps = vec![];
    for field in BUILD_DEPENDS_FIELDS {
        let Some(value) = fields.get(*field) else {
            continue;
        };
        let value = RE_RESTRICTIONS.replace_all(value, "");
        for relation in value.split(',') {
            let first = relation.split('|').next().unwrap_or("").trim();
            if first.is_empty() || first.starts_with('$') {
                continue;
            }
            deps.push(Dependency::parse(first)?);
        }
    }
    Ok(deps)
}
