// src/pkgstyle/rpm.rs

//! `rpm` package style for Fedora, CentOS, RHEL, openSUSE and derivatives
//!
//! Template: a directory containing a `*.spec` file and any extra sources
//! or patches, rendered into `SOURCES/` of an rpmbuild `_topdir`.
//!
//! Source package: a single `.src.rpm`. Packages are built by
//! `rpmbuild --rebuild` on the host or by `mock` for isolated builds.

use super::{DistroRequires, PackageStyle, direct_output, file_name, first_srcpkg};
use crate::error::{Error, Result};
use crate::fsutil::{copy_into, files_matching};
use crate::run::Cmd;
use crate::template::{PackageTemplate, TemplateEnv};
use crate::version::Dependency;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

const RELATION_OPS: &[&str] = &["<", "<=", "=", "==", ">=", ">", "!="];

#[derive(Debug, Clone, Copy, Default)]
pub struct Rpm;

impl PackageStyle for Rpm {
    fn name(&self) -> &'static str {
        "rpm"
    }

    fn supported_distros(&self) -> &'static [&'static str] {
        &[
            "fedora",
            "centos",
            "rhel",
            "rocky",
            "almalinux",
            "opensuse",
            "sles",
            "oracle",
            "pidora",
            "scientific",
        ]
    }

    fn distro_requires(&self) -> DistroRequires {
        DistroRequires {
            core: &["rpm-build", "rpmdevtools"],
            isolated: &["mock"],
        }
    }

    fn is_valid_template(&self, path: &Path) -> bool {
        find_spec(path).is_ok()
    }

    fn template_name(&self, path: &Path) -> Result<String> {
        let spec = find_spec(path)?;
        spec_tag(&fs::read_to_string(&spec)?, "Name").ok_or_else(|| {
            Error::ParsingFailed(format!("unable to determine Name from: {}", spec.display()))
        })
    }

    fn srcpkg_nvr(&self, srcpkg: &Path) -> Result<String> {
        let name = file_name(srcpkg)?;
        name.strip_suffix(".src.rpm").map(str::to_string).ok_or_else(|| {
            Error::InvalidSourcePackageFormat(format!(
                "rpm source package must be .src.rpm but got: {name}"
            ))
        })
    }

    fn build_srcpkg(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        archives: &[PathBuf],
        template: &PackageTemplate,
        env: &TemplateEnv,
    ) -> Result<Vec<PathBuf>> {
        let top_dir = fs::canonicalize(build_dir)?;
        let sources = top_dir.join("SOURCES");
        template.render(&sources, env)?;
        for archive in archives {
            copy_into(archive, &sources)?;
        }
        let spec = find_spec(&sources)?;

        info!("building rpm source package: {}", spec.display());
        rpmbuild(&top_dir).arg("-bs").arg(&spec).output()?;

        let srpms = files_matching(&top_dir.join("SRPMS"), |n| n.ends_with(".src.rpm"))?;
        let [srpm] = srpms.as_slice() else {
            return Err(Error::UnexpectedCommandOutput(format!(
                "rpmbuild should produce a single .src.rpm but got {} in: {}",
                srpms.len(),
                top_dir.join("SRPMS").display()
            )));
        };
        info!("copying source package to result dir: {}", out_dir.display());
        fs::create_dir_all(out_dir)?;
        Ok(vec![copy_into(srpm, out_dir)?])
    }

    fn build_packages(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        srcpkgs: &[PathBuf],
        isolated: bool,
    ) -> Result<Vec<PathBuf>> {
        let srpm = first_srcpkg(srcpkgs)?;
        self.srcpkg_nvr(srpm)?;
        fs::create_dir_all(build_dir)?;
        fs::create_dir_all(out_dir)?;

        if isolated {
            info!("starting isolated rpm build using mock");
            Cmd::new("mock")
                .arg("--resultdir")
                .arg(out_dir)
                .arg(srpm)
                .direct(direct_output())
                .output()?;
            return files_matching(out_dir, |n| n.ends_with(".rpm") && !n.ends_with(".src.rpm"));
        }

        let top_dir = fs::canonicalize(build_dir)?;
        info!("starting direct host rpm build using rpmbuild");
        rpmbuild(&top_dir)
            .arg("--rebuild")
            .arg(srpm)
            .direct(direct_output())
            .output()?;

        info!("copying built packages to result dir: {}", out_dir.display());
        let mut pkgs = vec![];
        for entry in WalkDir::new(top_dir.join("RPMS")).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let is_rpm = entry.file_name().to_string_lossy().ends_with(".rpm");
            if entry.file_type().is_file() && is_rpm {
                pkgs.push(copy_into(entry.path(), out_dir)?);
            }
        }
        Ok(pkgs)
    }

    fn install_custom_packages(&self, packages: &[PathBuf], _distro: &str, interactive: bool) -> Result<()> {
        package_manager("install", interactive)
            .args(packages)
            .direct(true)
            .output()?;
        Ok(())
    }

    fn install_distro_packages(&self, packages: &[String], _distro: &str, interactive: bool) -> Result<()> {
        package_manager("install", interactive)
            .args(packages)
            .direct(true)
            .output()?;
        Ok(())
    }

    fn build_deps_from_template(&self, template: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        let spec = find_spec(template)?;
        let text = fs::read_to_string(&spec)?;
        let mut deps = vec![];
        for line in text.lines() {
            if let Some(value) = strip_tag(line, "BuildRequires") {
                deps.extend(parse_relations(value)?);
            }
        }
        Ok(deps)
    }

    fn build_deps_from_srcpkg(&self, srcpkg: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        let out = Cmd::new("rpm").arg("-qpR").arg(srcpkg).output()?;
        out.lines()
            .filter(|l| !l.starts_with("rpmlib("))
            .map(Dependency::parse)
            .collect()
    }

    fn install_build_deps(&self, deps: &[Dependency], _distro: &str, interactive: bool) -> Result<()> {
        let args: Vec<String> = if has_dnf() {
            deps.iter().map(Dependency::to_string).collect()
        } else {
            deps.iter().map(|d| d.name_only().to_string()).collect()
        };
        package_manager("install", interactive)
            .args(&args)
            .direct(true)
            .output()?;
        Ok(())
    }
}

fn rpmbuild(top_dir: &Path) -> Cmd {
    Cmd::new("rpmbuild")
        .arg("--define")
        .arg(format!("_topdir {}", top_dir.display()))
}

fn has_dnf() -> bool {
    which::which("dnf").is_ok()
}

/// `dnf`, falling back to `yum` on older distros
fn package_manager(action: &str, interactive: bool) -> Cmd {
    let pm = if has_dnf() { "dnf" } else { "yum" };
    let cmd = Cmd::sudo(pm).arg(action);
    if interactive { cmd } else { cmd.arg("-y") }
}

/// The single `.spec` file in a directory
fn find_spec(dir: &Path) -> Result<PathBuf> {
    let specs = if dir.is_dir() {
        files_matching(dir, |n| n.ends_with(".spec"))?
    } else {
        vec![]
    };
    specs.into_iter().next().ok_or_else(|| {
        Error::ParsingFailed(format!("no .spec file found in: {}", dir.display()))
    })
}

/// Value of a `Tag: value` preamble line, matching the tag case-insensitively
fn strip_tag<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    key.trim().eq_ignore_ascii_case(tag).then(|| value.trim())
}

fn spec_tag(spec: &str, tag: &str) -> Option<String> {
    spec.lines()
        .find_map(|l| strip_tag(l, tag))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse an RPM relation list such as `gcc, meson >= 0.49 ninja-build`
fn parse_relations(value: &str) -> Result<Vec<Dependency>> {
    let mut deps = vec![];
    for chunk in value.split(',') {
        let tokens: Vec<&str> = chunk.split_whitespace().collect();
        let mut i = 0;
        while i < tokens.len() {
            let versioned = tokens.get(i + 1).is_some_and(|t| RELATION_OPS.contains(t));
            let len = if versioned { 3 } else { 1 };
            let end = (i + len).min(tokens.len());
            deps.push(Dependency::parse(&tokens[i..end].join(" "))?);
            i = end;
        }
    }
    Ok(deps)
}
