// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use apkg::pkgstyle::{DistroRequires, PackageStyle, StyleRegistry};
use apkg::{Dependency, PackageTemplate, Project, Result, TemplateEnv};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Distro handled by [`FakeStyle`]
pub const FAKE_DISTRO: &str = "fakedistro-1";

/// Package style writing plain marker files instead of calling native tools
///
/// Templates are directories containing `fake.template`; the package name
/// is read from a `NAME` file next to it.
#[derive(Debug, Default)]
pub struct FakeStyle {
    /// Build no source package files at all
    pub empty_srcpkg: bool,
    pub srcpkg_builds: AtomicUsize,
    pub package_builds: AtomicUsize,
    pub installed: Mutex<Vec<String>>,
}

impl FakeStyle {
    pub fn srcpkg_builds(&self) -> usize {
        self.srcpkg_builds.load(Ordering::SeqCst)
    }

    pub fn package_builds(&self) -> usize {
        self.package_builds.load(Ordering::SeqCst)
    }
}

impl PackageStyle for FakeStyle {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn supported_distros(&self) -> &'static [&'static str] {
        &["fakedistro"]
    }

    fn distro_requires(&self) -> DistroRequires {
        DistroRequires {
            core: &["fake-devel"],
            isolated: &["fake-chroot"],
        }
    }

    fn is_valid_template(&self, path: &Path) -> bool {
        path.join("fake.template").exists()
    }

    fn template_name(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path.join("NAME"))?.trim().to_string())
    }

    fn srcpkg_nvr(&self, srcpkg: &Path) -> Result<String> {
        Ok(srcpkg
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    fn build_srcpkg(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        archives: &[PathBuf],
        template: &PackageTemplate,
        env: &TemplateEnv,
    ) -> Result<Vec<PathBuf>> {
        self.srcpkg_builds.fetch_add(1, Ordering::SeqCst);
        if self.empty_srcpkg {
            return Ok(vec![]);
        }
        template.render(build_dir, env)?;
        fs::create_dir_all(out_dir)?;
        let srcpkg = out_dir.join(format!("{}.fsrc", env.nvr));
        fs::copy(build_dir.join("fake.template"), &srcpkg)?;
        let mut results = vec![srcpkg];
        for archive in archives {
            let name = archive.file_name().unwrap_or_default();
            let dst = out_dir.join(name);
            fs::copy(archive, &dst)?;
            results.push(dst);
        }
        Ok(results)
    }

    fn build_packages(
        &self,
        build_dir: &Path,
        out_dir: &Path,
        srcpkgs: &[PathBuf],
        _isolated: bool,
    ) -> Result<Vec<PathBuf>> {
        self.package_builds.fetch_add(1, Ordering::SeqCst);
        // the pipeline hands over a fresh build dir
        let leftovers = fs::read_dir(build_dir)?.count();
        fs::create_dir_all(out_dir)?;
        let nvr = self.srcpkg_nvr(&srcpkgs[0])?;
        let pkg = out_dir.join(format!("{nvr}.fpkg"));
        fs::write(&pkg, format!("leftovers: {leftovers}\n"))?;
        Ok(vec![pkg])
    }

    fn install_custom_packages(
        &self,
        packages: &[PathBuf],
        _distro: &str,
        _interactive: bool,
    ) -> Result<()> {
        let mut installed = self.installed.lock().unwrap();
        installed.extend(packages.iter().map(|p| p.display().to_string()));
        Ok(())
    }

    fn install_distro_packages(
        &self,
        packages: &[String],
        _distro: &str,
        _interactive: bool,
    ) -> Result<()> {
        self.installed.lock().unwrap().extend(packages.iter().cloned());
        Ok(())
    }

    fn build_deps_from_srcpkg(&self, _srcpkg: &Path, _distro: &str) -> Result<Vec<Dependency>> {
        Ok(vec![Dependency::parse("libfake-dev (>= 1.0)")?])
    }
}

/// Registry holding only the given fake style
pub fn fake_registry(style: &Arc<FakeStyle>) -> Arc<StyleRegistry> {
    let style: Arc<dyn PackageStyle> = style.clone();
    Arc::new(StyleRegistry::new(vec![style]))
}

/// Write a file, creating parent directories
pub fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Write an executable shell script
pub fn write_script(path: &Path, content: &str) {
    write_file(path, content);
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Create a project with a fake package template and the given config
///
/// Returns (TempDir, project_path) - keep the TempDir alive to prevent cleanup.
pub fn setup_project(config: &str) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("fakeproj");

    write_file(&path.join("distro/config/apkg.toml"), config);
    write_file(
        &path.join("distro/pkg/fake/fake.template"),
        "name: {{ name }}\nversion: {{ version }}\nrelease: {{ release }}\ndistro: {{ distro }}\n",
    );
    write_file(&path.join("distro/pkg/fake/NAME"), "fakepkg\n");

    (temp_dir, path)
}

/// Load a project bound to the fake style
pub fn load_project(path: &Path, style: &Arc<FakeStyle>) -> Project {
    Project::with_registry(path, fake_registry(style)).unwrap()
}

/// Whether the external tools a test needs are available
pub fn have_tools(tools: &[&str]) -> bool {
    tools.iter().all(|t| which::which(t).is_ok())
}

fn git(path: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=apkg", "-c", "user.email=apkg@example.com"])
        .args(args)
        .current_dir(path)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Turn a project directory into a git repository without any commits
pub fn git_init(path: &Path) {
    git(path, &["init", "-q"]);
}

/// Turn a project directory into a git repository with everything committed
pub fn git_init_commit(path: &Path) {
    git_init(path);
    git(path, &["add", "-A"]);
    git(path, &["commit", "-q", "-m", "initial"]);
}

/// Commit all current changes
pub fn git_commit_all(path: &Path, message: &str) {
    git(path, &["add", "-A"]);
    git(path, &["commit", "-q", "-m", message]);
}

/// Make-archive script writing `fakepkg-<version>.tar.gz` and counting its runs
///
/// Each run appends a line to `runs.log` in the project directory. The
/// archive version is read from `VERSION`.
pub fn write_make_archive_script(path: &Path) {
    write_script(
        &path.join("scripts/make-archive.sh"),
        "#!/bin/sh\n\
         set -e\n\
         echo run >> runs.log\n\
         version=$(cat VERSION)\n\
         mkdir -p build\n\
         printf 'fake archive %s\\n' \"$version\" > build/fakepkg-$version.tar.gz\n\
         echo \"creating archive\"\n\
         echo build/fakepkg-$version.tar.gz\n",
    );
    write_file(&path.join("VERSION"), "1.0\n");
    write_file(&path.join(".gitignore"), "runs.log\nbuild/\npkg/\n");
}

/// Number of make-archive script runs
pub fn script_runs(path: &Path) -> usize {
    fs::read_to_string(path.join("runs.log"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}
