// src/pkgstyle/mod.rs

//! Package styles
//!
//! A package style wraps one distro family's packaging toolchain and file
//! conventions behind the [`PackageStyle`] trait:
//!
//! - `deb` - Debian, Ubuntu and derivatives (dpkg-buildpackage, pbuilder)
//! - `rpm` - Fedora, RHEL, openSUSE and derivatives (rpmbuild, mock)
//! - `arch` - Arch Linux and derivatives (makepkg)
//! - `nix` - Nix and NixOS (nix build)
//!
//! Styles are assembled into a [`StyleRegistry`] at startup. Capabilities
//! a style doesn't provide default to a `DistroNotSupported` error naming
//! the style and the capability.

mod arch;
mod deb;
mod nix;
mod rpm;

pub use arch::Arch;
pub use deb::Deb;
pub use nix::Nix;
pub use rpm::Rpm;

use crate::error::{Error, Result};
use crate::template::{PackageTemplate, TemplateEnv};
use crate::version::Dependency;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Distro packages a style needs on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct DistroRequires {
    /// Always required for packaging
    pub core: &'static [&'static str],
    /// Additionally required for isolated builds
    pub isolated: &'static [&'static str],
}

impl DistroRequires {
    /// Packages to install, including isolated build requirements if asked
    pub fn packages(&self, isolated: bool) -> Vec<String> {
        let mut pkgs: Vec<String> = self.core.iter().map(|s| s.to_string()).collect();
        if isolated {
            pkgs.extend(self.isolated.iter().map(|s| s.to_string()));
        }
        pkgs
    }
}

/// Capability set every packaging backend implements
pub trait PackageStyle: Send + Sync + fmt::Debug {
    /// Short style name: `deb`, `rpm`, ...
    fn name(&self) -> &'static str;

    /// Distro id prefixes handled by this style
    fn supported_distros(&self) -> &'static [&'static str];

    fn distro_requires(&self) -> DistroRequires {
        DistroRequires::default()
    }

    /// Whether `distro` (idver or free-form) is handled by this style
    fn matches_distro(&self, distro: &str) -> bool {
        let distro = distro.to_lowercase();
        self.supported_distros()
            .iter()
            .any(|d| distro.starts_with(d))
    }

    /// Cheap structural check whether a directory is a template of this style
    fn is_valid_template(&self, path: &Path) -> bool;

    /// Package name declared by a template
    fn template_name(&self, path: &Path) -> Result<String>;

    /// Name-version-release of a built source package
    fn srcpkg_nvr(&self, srcpkg: &Path) -> Result<String>;

    /// Render the template, combine it with the archives and build a source
    /// package into `out_dir`. The primary source package file comes first.
    fn build_srcpkg(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        archives: &[PathBuf],
        template: &PackageTemplate,
        env: &TemplateEnv,
    ) -> Result<Vec<PathBuf>>;

    /// Build binary packages from a source package into `out_dir`
    fn build_packages(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        srcpkgs: &[PathBuf],
        isolated: bool,
    ) -> Result<Vec<PathBuf>>;

    /// Install local package files
    fn install_custom_packages(
        &self,
        _packages: &[PathBuf],
        _distro: &str,
        _interactive: bool,
    ) -> Result<()> {
        Err(Error::missing_capability(self.name(), "install_custom_packages"))
    }

    /// Install packages from distro repositories
    fn install_distro_packages(
        &self,
        _packages: &[String],
        _distro: &str,
        _interactive: bool,
    ) -> Result<()> {
        Err(Error::missing_capability(self.name(), "install_distro_packages"))
    }

    /// Build dependencies declared by a template
    fn build_deps_from_template(&self, _template: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        Err(Error::missing_capability(self.name(), "get_build_deps_from_template"))
    }

    /// Build dependencies declared by a source package
    fn build_deps_from_srcpkg(&self, _srcpkg: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        Err(Error::missing_capability(self.name(), "get_build_deps_from_srcpkg"))
    }

    /// Install build dependencies
    fn install_build_deps(
        &self,
        _deps: &[Dependency],
        _distro: &str,
        _interactive: bool,
    ) -> Result<()> {
        Err(Error::missing_capability(self.name(), "install_build_deps"))
    }
}

/// Ordered set of available package styles
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    styles: Vec<Arc<dyn PackageStyle>>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StyleRegistry {
    /// Registry of custom styles, resolved in the given order
    pub fn new(styles: Vec<Arc<dyn PackageStyle>>) -> Self {
        Self { styles }
    }

    /// All built-in styles
    pub fn builtin() -> Self {
        Self::new(vec![
            Arc::new(Deb),
            Arc::new(Rpm),
            Arc::new(Arch),
            Arc::new(Nix),
        ])
    }

    pub fn styles(&self) -> &[Arc<dyn PackageStyle>] {
        &self.styles
    }

    /// Look up a style by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn PackageStyle>> {
        self.styles.iter().find(|s| s.name() == name).cloned()
    }

    /// First style handling the distro, in registration order
    pub fn for_distro(&self, distro: &str) -> Result<Arc<dyn PackageStyle>> {
        let mut matching = self.styles.iter().filter(|s| s.matches_distro(distro));
        let Some(style) = matching.next() else {
            return Err(Error::DistroNotSupported(distro.to_string()));
        };
        let others: Vec<_> = matching.map(|s| s.name()).collect();
        if !others.is_empty() {
            warn!(
                "distro {} matches multiple package styles, using {} (also: {})",
                distro,
                style.name(),
                others.join(", ")
            );
        }
        debug!("package style for {}: {}", distro, style.name());
        Ok(Arc::clone(style))
    }

    /// First style recognizing the template directory
    pub fn for_template(&self, path: &Path) -> Option<Arc<dyn PackageStyle>> {
        self.styles
            .iter()
            .find(|s| s.is_valid_template(path))
            .cloned()
    }
}

/// Whether native build tool output should stream to the terminal
pub(crate) fn direct_output() -> bool {
    tracing::enabled!(tracing::Level::INFO)
}

/// Reject an empty source package list
pub(crate) fn first_srcpkg(srcpkgs: &[PathBuf]) -> Result<&Path> {
    srcpkgs
        .first()
        .map(PathBuf::as_path)
        .ok_or_else(|| Error::InvalidInput("no source package specified".to_string()))
}

/// File name of a path as UTF-8
pub(crate) fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("invalid file name: {}", path.display())))
}
