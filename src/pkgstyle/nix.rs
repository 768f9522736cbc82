// src/pkgstyle/nix.rs

//! `nix` package style for Nix and NixOS
//!
//! Template: `default.nix` written as if it lived in nixpkgs, plus a
//! `top-level.nix` wrapper making it buildable outside the official tree
//! by substituting the source archive. The template gets an extra
//! `src_hash` variable holding the SHA-256 of the archive.
//!
//! Source package: the rendered template plus the archive. Packages are
//! the files of the `nix build` result in the local store.

use super::{PackageStyle, first_srcpkg};
use crate::error::{Error, Result};
use crate::fsutil::{copy_dir, copy_into};
use crate::hash::sha256_file;
use crate::run::Cmd;
use crate::template::{PackageTemplate, TemplateEnv};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;
use walkdir::WalkDir;

static RE_PNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*pname\s*=\s*"(\S+)";"#).unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct Nix;

impl PackageStyle for Nix {
    fn name(&self) -> &'static str {
        "nix"
    }

    fn supported_distros(&self) -> &'static [&'static str] {
        &["nix"]
    }

    fn is_valid_template(&self, path: &Path) -> bool {
        path.join("default.nix").exists() && path.join("top-level.nix").exists()
    }

    fn template_name(&self, path: &Path) -> Result<String> {
        let expr = path.join("default.nix");
        let text = fs::read_to_string(&expr)?;
        text.lines()
            .find_map(|l| RE_PNAME.captures(l).map(|c| c[1].to_string()))
            .ok_or_else(|| {
                Error::ParsingFailed(format!("unable to determine pname from: {}", expr.display()))
            })
    }

    fn srcpkg_nvr(&self, srcpkg: &Path) -> Result<String> {
        // source package parent dir is named after the NVR
        let resolved = fs::canonicalize(srcpkg)?;
        resolved
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::ParsingFailed(format!("no NVR dir for: {}", srcpkg.display())))
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
        let env = env.with_var("src_hash", sha256_file(archive)?);

        info!("applying templates");
        template.render(build_dir, &env)?;
        info!("copying everything to: {}", out_dir.display());
        copy_dir(build_dir, out_dir)?;
        let out_archive = copy_into(archive, out_dir)?;
        Ok(vec![
            out_dir.join("top-level.nix"),
            out_dir.join("default.nix"),
            out_archive,
        ])
    }

    fn build_packages(
        &self,
        _build_dir: &Path,
        out_dir: &Path,
        srcpkgs: &[PathBuf],
        isolated: bool,
    ) -> Result<Vec<PathBuf>> {
        if isolated {
            info!("nix builds are always sandboxed, ignoring isolated flag");
        }
        let expr = first_srcpkg(srcpkgs)?;
        fs::create_dir_all(out_dir)?;
        let result = out_dir.join("result");

        info!("building using nix (silent unless it fails)");
        Cmd::new("nix")
            .args(["build", "-f"])
            .arg(expr)
            .arg("-o")
            .arg(&result)
            .args(["-L", "--keep-failed"])
            .output()?;

        let mut pkgs = vec![];
        for entry in WalkDir::new(&result).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                pkgs.push(entry.path().to_path_buf());
            }
        }
        Ok(pkgs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_detection_and_name() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("default.nix"),
            "{ stdenv }:\nstdenv.mkDerivation rec {\n  pname = \"knot-resolver\";\n}\n",
        )
        .unwrap();
        assert!(!Nix.is_valid_template(temp.path()));

        fs::write(temp.path().join("top-level.nix"), "import ./default.nix").unwrap();
        assert!(Nix.is_valid_template(temp.path()));
        assert_eq!(Nix.template_name(temp.path()).unwrap(), "knot-resolver");
    }

    #[test]
    fn test_srcpkg_nvr_is_parent_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("knot-resolver-5.1.2-1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("top-level.nix"), "").unwrap();
        assert_eq!(
            Nix.srcpkg_nvr(&dir.join("top-level.nix")).unwrap(),
            "knot-resolver-5.1.2-1"
        );
    }

    #[test]
    fn test_no_install_capabilities() {
        let err = Nix.install_build_deps(&[], "nixos", false).unwrap_err();
        assert!(matches!(err, Error::DistroNotSupported(_)));
    }
}
