// src/pkgstyle/arch.rs

//! `arch` package style for Arch Linux and derivatives
//!
//! Template and source package are both a `PKGBUILD`; its variables are
//! read by sourcing it in bash. Packages are built by `makepkg` on the
//! host. Isolated builds are not supported.

use super::{DistroRequires, PackageStyle, direct_output, file_name, first_srcpkg};
use crate::error::{Error, Result};
use crate::fsutil::{copy_dir, copy_into, files_matching};
use crate::run::Cmd;
use crate::template::{PackageTemplate, TemplateEnv};
use crate::version::Dependency;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const PKGBUILD: &str = "PKGBUILD";

#[derive(Debug, Clone, Copy, Default)]
pub struct Arch;

impl PackageStyle for Arch {
    fn name(&self) -> &'static str {
        "arch"
    }

    fn supported_distros(&self) -> &'static [&'static str] {
        &["arch", "manjaro", "endeavouros"]
    }

    fn distro_requires(&self) -> DistroRequires {
        DistroRequires {
            core: &["base-devel"],
            isolated: &[],
        }
    }

    fn is_valid_template(&self, path: &Path) -> bool {
        path.join(PKGBUILD).exists()
    }

    fn template_name(&self, path: &Path) -> Result<String> {
        parse_pkgbuild(&path.join(PKGBUILD), "$pkgname")
    }

    fn srcpkg_nvr(&self, srcpkg: &Path) -> Result<String> {
        parse_pkgbuild(srcpkg, "$pkgname-$pkgver-$pkgrel")
    }

    fn build_srcpkg(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        archives: &[PathBuf],
        template: &PackageTemplate,
        env: &TemplateEnv,
    ) -> Result<Vec<PathBuf>> {
        let in_pkgbuild = build_dir.join(PKGBUILD);
        info!("building arch source package: {}", in_pkgbuild.display());
        template.render(build_dir, env)?;

        info!("copying PKGBUILD and archives to: {}", out_dir.display());
        fs::create_dir_all(out_dir)?;
        let mut results = vec![copy_into(&in_pkgbuild, out_dir)?];
        for archive in archives {
            results.push(copy_into(archive, out_dir)?);
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
        if isolated {
            return Err(Error::missing_capability(self.name(), "isolated build"));
        }
        let pkgbuild = first_srcpkg(srcpkgs)?;
        if file_name(pkgbuild)? != PKGBUILD {
            return Err(Error::InvalidSourcePackageFormat(format!(
                "arch source package format is PKGBUILD but got: {}",
                pkgbuild.display()
            )));
        }
        let srcpkg_dir = pkgbuild.parent().unwrap_or(Path::new("."));

        info!("copying source package to build dir: {}", build_dir.display());
        copy_dir(srcpkg_dir, build_dir)?;

        info!("starting arch package build using makepkg");
        Cmd::new("makepkg")
            .cwd(build_dir)
            .direct(direct_output())
            .output()?;

        info!("copying built packages to result dir: {}", out_dir.display());
        fs::create_dir_all(out_dir)?;
        files_matching(build_dir, |n| n.contains(".pkg.tar."))?
            .iter()
            .map(|p| copy_into(p, out_dir))
            .collect()
    }

    fn install_custom_packages(&self, packages: &[PathBuf], _distro: &str, interactive: bool) -> Result<()> {
        pacman("-U", interactive).args(packages).direct(true).output()?;
        Ok(())
    }

    fn install_distro_packages(&self, packages: &[String], _distro: &str, interactive: bool) -> Result<()> {
        pacman("-S", interactive).args(packages).direct(true).output()?;
        Ok(())
    }

    fn build_deps_from_template(&self, template: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        pkgbuild_deps(&template.join(PKGBUILD))
    }

    fn build_deps_from_srcpkg(&self, srcpkg: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        pkgbuild_deps(srcpkg)
    }

    fn install_build_deps(&self, deps: &[Dependency], _distro: &str, interactive: bool) -> Result<()> {
        // pacman can't install by version constraint
        let names: Vec<String> = deps.iter().map(|d| d.name_only().to_string()).collect();
        pacman("-S", interactive)
            .arg("--needed")
            .args(&names)
            .direct(true)
            .output()?;
        Ok(())
    }
}

fn pacman(op: &str, interactive: bool) -> Cmd {
    let cmd = Cmd::sudo("pacman").arg(op);
    if interactive { cmd } else { cmd.arg("--noconfirm") }
}

/// Evaluate a bash expression in the context of a sourced PKGBUILD
fn parse_pkgbuild(pkgbuild: &Path, expr: &str) -> Result<String> {
    let script = format!(". \"$1\" && echo \"{expr}\"");
    let out = Cmd::new("bash")
        .args(["-c", &script, "bash"])
        .arg(pkgbuild)
        .log_cmd(false)
        .output()?;
    out.last_line().map(str::to_string).ok_or_else(|| {
        Error::ParsingFailed(format!("unable to evaluate {expr} in: {}", pkgbuild.display()))
    })
}

/// `depends` and `makedepends` arrays of a PKGBUILD
fn pkgbuild_deps(pkgbuild: &Path) -> Result<Vec<Dependency>> {
    let script = r#". "$1" && for d in "${depends[@]}" "${makedepends[@]}"; do echo "$d"; done"#;
    let out = Cmd::new("bash")
        .args(["-c", script, "bash"])
        .arg(pkgbuild)
        .log_cmd(false)
        .output()?;
    out.lines().map(Dependency::parse).collect()
}
