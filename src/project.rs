// src/project.rs

//! The project being packaged
//!
//! A [`Project`] is rooted at a directory following a fixed layout:
//!
//! ```text
//! distro/pkg/<template>/       packaging templates
//! distro/config/apkg.toml      project config
//! pkg/archives/{dev,upstream,unpacked}/
//! pkg/build/{pkgs,srcpkgs}/<distro>/<nvr>/
//! pkg/{pkgs,srcpkgs}/<distro>/<nvr>/
//! pkg/.cache.json
//! ```
//!
//! Input (`distro/`) and output (`pkg/`) roots are tracked separately so
//! that upstream builds can read templates shipped inside a release archive
//! while still writing results into the working project.
//!
//! VCS detection, the working tree checksum, template discovery and the
//! upstream version are computed at most once per instance.

use crate::cache::ProjectCache;
use crate::error::{Error, Result};
use crate::hash::sha256;
use crate::pkgstyle::StyleRegistry;
use crate::run::Cmd;
use crate::template::PackageTemplate;
use crate::upstream::{HttpClient, version_from_script};
use crate::version::Version;
use minijinja::{Environment, context};
use std::cell::OnceCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const INPUT_BASE_DIR: &str = "distro";
pub const OUTPUT_BASE_DIR: &str = "pkg";
pub const CONFIG_FILE: &str = "apkg.toml";

/// Length of each component of the project checksum
const CHECKSUM_PART_LEN: usize = 10;

/// Version control system of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vcs {
    Git,
}

impl fmt::Display for Vcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
        }
    }
}

pub struct Project {
    path: PathBuf,
    name: String,
    registry: Arc<StyleRegistry>,
    input_path: PathBuf,
    output_path: PathBuf,
    config: toml::Table,
    cache: ProjectCache,
    vcs: OnceCell<Option<Vcs>>,
    checksum: OnceCell<Option<String>>,
    templates: OnceCell<Vec<PackageTemplate>>,
    upstream_version: OnceCell<Option<Version>>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("input_path", &self.input_path)
            .field("output_path", &self.output_path)
            .finish_non_exhaustive()
    }
}

impl Project {
    /// Load the project at `path` with the built-in package styles
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_registry(path, Arc::new(StyleRegistry::builtin()))
    }

    /// Load the project at `path` resolving templates against `registry`
    pub fn with_registry(path: impl Into<PathBuf>, registry: Arc<StyleRegistry>) -> Result<Self> {
        let path = path.into();
        let input_path = path.join(INPUT_BASE_DIR);
        let output_path = path.join(OUTPUT_BASE_DIR);
        let cache = ProjectCache::new(output_path.join(".cache.json"));
        let mut proj = Self {
            name: String::new(),
            path,
            registry,
            input_path,
            output_path,
            config: toml::Table::new(),
            cache,
            vcs: OnceCell::new(),
            checksum: OnceCell::new(),
            templates: OnceCell::new(),
            upstream_version: OnceCell::new(),
        };
        proj.load_config()?;
        Ok(proj)
    }

    /// Re-bind project input (templates, config) to another `distro/` dir
    ///
    /// Output paths and the cache are left untouched.
    pub fn load_input(&mut self, input_path: impl Into<PathBuf>) -> Result<()> {
        self.input_path = input_path.into();
        self.templates = OnceCell::new();
        self.upstream_version = OnceCell::new();
        self.load_config()
    }

    fn load_config(&mut self) -> Result<()> {
        let config_path = self.config_path();
        self.config = if config_path.exists() {
            debug!("loading project config: {}", config_path.display());
            let text = fs::read_to_string(&config_path)?;
            text.parse::<toml::Table>().map_err(|e| {
                Error::ParsingFailed(format!("project config {}: {e}", config_path.display()))
            })?
        } else {
            debug!("project config not found: {}", config_path.display());
            toml::Table::new()
        };
        self.name = match self.config_str("project.name") {
            Some(name) => name.to_string(),
            None => self.dir_name(),
        };
        Ok(())
    }

    fn dir_name(&self) -> String {
        let resolved = fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<StyleRegistry> {
        &self.registry
    }

    pub fn cache(&mut self) -> &mut ProjectCache {
        &mut self.cache
    }

    // Input paths

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn templates_path(&self) -> PathBuf {
        self.input_path.join("pkg")
    }

    pub fn config_path(&self) -> PathBuf {
        self.input_path.join("config").join(CONFIG_FILE)
    }

    // Output paths

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_path.join("archives")
    }

    pub fn dev_archive_path(&self) -> PathBuf {
        self.archive_path().join("dev")
    }

    pub fn upstream_archive_path(&self) -> PathBuf {
        self.archive_path().join("upstream")
    }

    pub fn unpacked_archive_path(&self) -> PathBuf {
        self.archive_path().join("unpacked")
    }

    pub fn build_path(&self) -> PathBuf {
        self.output_path.join("build")
    }

    pub fn package_build_path(&self) -> PathBuf {
        self.build_path().join("pkgs")
    }

    pub fn srcpkg_build_path(&self) -> PathBuf {
        self.build_path().join("srcpkgs")
    }

    pub fn package_out_path(&self) -> PathBuf {
        self.output_path.join("pkgs")
    }

    pub fn srcpkg_out_path(&self) -> PathBuf {
        self.output_path.join("srcpkgs")
    }

    // Config

    /// Look up a dotted config path such as `upstream.archive_url`
    pub fn config_get(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut value = self.config.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value)
    }

    /// String config value, `None` when missing or not a string
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config_get(key).and_then(toml::Value::as_str)
    }

    /// Config value naming a script, resolved against the project root
    pub fn config_script(&self, key: &str) -> Option<PathBuf> {
        Some(self.path.join(self.config_str(key)?))
    }

    /// Error for a config option a stage requires
    pub fn missing_option(&self, option: &str) -> Error {
        Error::MissingRequiredConfigOption {
            option: option.to_string(),
            config_path: self.config_path(),
        }
    }

    // VCS

    /// Version control system in use, detected once
    pub fn vcs(&self) -> Option<Vcs> {
        *self.vcs.get_or_init(|| {
            let git_dir = Cmd::new("git")
                .args(["rev-parse", "--git-dir"])
                .cwd(&self.path)
                .fatal(false)
                .log_cmd(false)
                .output();
            match git_dir {
                Ok(out) if out.success() => Some(Vcs::Git),
                Ok(_) => None,
                Err(e) => {
                    debug!("VCS detection failed: {}", e);
                    None
                }
            }
        })
    }

    /// Short checksum of the current working tree state
    ///
    /// `<HEAD>` or `<HEAD>-<diff hash>` when there are uncommitted changes
    /// to tracked files. `None` without a VCS or before the first commit.
    /// Computed once per instance.
    pub fn checksum(&self) -> Result<Option<&str>> {
        if let Some(checksum) = self.checksum.get() {
            return Ok(checksum.as_deref());
        }
        let checksum = match self.vcs() {
            Some(Vcs::Git) => self.git_checksum()?,
            None => None,
        };
        Ok(self.checksum.get_or_init(|| checksum).as_deref())
    }

    fn git_checksum(&self) -> Result<Option<String>> {
        let git = |args: &[&str], fatal: bool| {
            Cmd::new("git")
                .args(args)
                .cwd(&self.path)
                .fatal(fatal)
                .log_cmd(false)
                .output()
        };
        let head = git(&["rev-parse", "--verify", "-q", "HEAD"], false)?;
        if !head.success() {
            info!("git repository has no commits yet, project checksum unavailable");
            return Ok(None);
        }
        let mut checksum: String = head.stdout.chars().take(CHECKSUM_PART_LEN).collect();
        let diff = git(&["diff", "HEAD"], true)?;
        if !diff.stdout.is_empty() {
            let diff_hash = sha256(diff.stdout.as_bytes());
            checksum.push('-');
            checksum.push_str(&diff_hash[..CHECKSUM_PART_LEN]);
        }
        debug!("project checksum: {}", checksum);
        Ok(Some(checksum))
    }

    /// Whether the cache should be used for this invocation
    ///
    /// Needs a detected VCS and a project checksum; failing to compute the
    /// checksum disables the cache instead of failing the stage.
    pub fn cache_enabled(&self, use_cache: bool) -> bool {
        if !self.cache.enabled(use_cache, self.vcs()) {
            return false;
        }
        match self.checksum() {
            Ok(Some(_)) => true,
            Ok(None) => {
                info!("project checksum unavailable -> cache DISABLED");
                false
            }
            Err(e) => {
                warn!("failed to compute project checksum: {} -> cache DISABLED", e);
                false
            }
        }
    }

    // Templates

    /// Package templates found in the templates dir, discovered once
    pub fn templates(&self) -> &[PackageTemplate] {
        self.templates.get_or_init(|| {
            let dir = self.templates_path();
            load_templates(&dir, &self.registry).unwrap_or_else(|e| {
                warn!("unable to read package templates in {}: {}", dir.display(), e);
                vec![]
            })
        })
    }

    /// First template whose package style handles `distro`
    pub fn get_template_for_distro(&self, distro: &str) -> Result<&PackageTemplate> {
        self.templates()
            .iter()
            .find(|t| t.supports_distro(distro))
            .ok_or_else(|| Error::MissingPackagingTemplate {
                distro: distro.to_string(),
                templates_path: self.templates_path(),
            })
    }

    // Archives

    /// Archives in the dev or upstream archive dir whose name starts with `name`
    pub fn find_archives_by_name(&self, name: &str, upstream: bool) -> Result<Vec<PathBuf>> {
        let dir = if upstream {
            self.upstream_archive_path()
        } else {
            self.dev_archive_path()
        };
        let pattern = format!("{}*", dir.join(glob::Pattern::escape(name)).display());
        let paths = glob::glob(&pattern)
            .map_err(|e| Error::InvalidInput(format!("invalid archive name {name}: {e}")))?;
        let mut found = vec![];
        for path in paths {
            let path = path.map_err(|e| e.into_error())?;
            if path.is_file() && !path.to_string_lossy().ends_with(".asc") {
                found.push(path);
            }
        }
        Ok(found)
    }

    /// Upstream archive URL for `version`, `None` when not configured
    pub fn upstream_archive_url(&self, version: &str) -> Result<Option<String>> {
        self.render_url("upstream.archive_url", version)
    }

    /// Upstream signature URL for `version`, `None` when not configured
    pub fn upstream_signature_url(&self, version: &str) -> Result<Option<String>> {
        self.render_url("upstream.signature_url", version)
    }

    fn render_url(&self, key: &str, version: &str) -> Result<Option<String>> {
        let Some(url) = self.config_str(key) else {
            return Ok(None);
        };
        let jinja = Environment::new();
        let rendered = jinja
            .render_str(url, context! { project => &self.name, version => version })
            .map_err(|e| Error::TemplateRenderFailed {
                path: self.config_path(),
                reason: format!("{key}: {e}"),
            })?;
        Ok(Some(rendered))
    }

    /// Latest upstream version, detected once
    ///
    /// Uses `upstream.version_script` when set, else scrapes the HTML
    /// listing at the parent URL of `upstream.archive_url`.
    pub fn upstream_version(&self) -> Result<Option<&Version>> {
        if let Some(version) = self.upstream_version.get() {
            return Ok(version.as_ref());
        }
        let version = self.detect_upstream_version()?;
        if let Some(v) = &version {
            info!("detected upstream version: {}", v);
        }
        Ok(self.upstream_version.get_or_init(|| version).as_ref())
    }

    fn detect_upstream_version(&self) -> Result<Option<Version>> {
        if let Some(script) = self.config_script("upstream.version_script") {
            return version_from_script(&script, &self.path).map(Some);
        }
        let Some(url) = self.upstream_archive_url("")? else {
            return Ok(None);
        };
        let listing_url = Url::parse(&url)
            .and_then(|u| u.join("./"))
            .map_err(|e| Error::InvalidInput(format!("invalid upstream.archive_url {url}: {e}")))?;
        HttpClient::new()?.version_from_listing(listing_url.as_str())
    }
}

/// Bind every subdirectory of `dir` recognized by a package style
fn load_templates(dir: &Path, registry: &StyleRegistry) -> Result<Vec<PackageTemplate>> {
    if !dir.is_dir() {
        debug!("package templates dir not found: {}", dir.display());
        return Ok(vec![]);
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    let mut templates = vec![];
    for path in entries {
        match PackageTemplate::detect(&path, registry) {
            Some(template) => {
                debug!("package template {} ({})", path.display(), template.style().name());
                templates.push(template);
            }
            None => debug!("ignoring unknown package style in {}", path.display()),
        }
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_layout_and_default_name() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("knot-resolver");
        fs::create_dir_all(&root).unwrap();
        let proj = Project::load(&root).unwrap();

        assert_eq!(proj.name(), "knot-resolver");
        assert_eq!(proj.templates_path(), root.join("distro/pkg"));
        assert_eq!(proj.config_path(), root.join("distro/config/apkg.toml"));
        assert_eq!(proj.dev_archive_path(), root.join("pkg/archives/dev"));
        assert_eq!(proj.unpacked_archive_path(), root.join("pkg/archives/unpacked"));
        assert_eq!(proj.srcpkg_build_path(), root.join("pkg/build/srcpkgs"));
        assert_eq!(proj.package_out_path(), root.join("pkg/pkgs"));
        assert_eq!(proj.cache.path(), root.join("pkg/.cache.json"));
    }

    #[test]
    fn test_config_lookup() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("distro/config/apkg.toml"),
            r#"
[project]
name = "kresd"
make_archive_script = "scripts/make-archive.sh"

[upstream]
archive_url = "https://example.org/{{ project }}/{{ project }}-{{ version }}.tar.xz"
"#,
        );
        let proj = Project::load(temp.path()).unwrap();

        assert_eq!(proj.name(), "kresd");
        assert!(proj.config_get("project").unwrap().is_table());
        assert!(proj.config_get("project.missing").is_none());
        assert!(proj.config_get("nothing.at.all").is_none());
        assert_eq!(
            proj.config_script("project.make_archive_script").unwrap(),
            temp.path().join("scripts/make-archive.sh")
        );
        assert_eq!(
            proj.upstream_archive_url("5.1.2").unwrap().unwrap(),
            "https://example.org/kresd/kresd-5.1.2.tar.xz"
        );
        assert!(proj.upstream_signature_url("5.1.2").unwrap().is_none());
    }

    #[test]
    fn test_invalid_config() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("distro/config/apkg.toml"), "[project\n");
        let err = Project::load(temp.path()).unwrap_err();
        assert!(matches!(err, Error::ParsingFailed(_)));
    }

    #[test]
    fn test_templates_and_distro_lookup() {
        let temp = TempDir::new().unwrap();
        let pkg = temp.path().join("distro/pkg");
        write(&pkg.join("rpm/kresd.spec"), "Name: kresd\n");
        write(&pkg.join("arch/PKGBUILD"), "pkgname=kresd\n");
        fs::create_dir_all(pkg.join("unknown")).unwrap();
        let proj = Project::load(temp.path()).unwrap();

        let styles: Vec<_> = proj.templates().iter().map(|t| t.style().name()).collect();
        assert_eq!(styles, ["arch", "rpm"]);
        assert_eq!(
            proj.get_template_for_distro("fedora-40").unwrap().path(),
            pkg.join("rpm")
        );
        let err = proj.get_template_for_distro("debian-12").unwrap_err();
        assert!(matches!(err, Error::MissingPackagingTemplate { .. }));
    }

    #[test]
    fn test_load_input_rebinds_templates() {
        let temp = TempDir::new().unwrap();
        let unpacked = temp.path().join("unpacked/kresd-1.0/distro");
        write(&unpacked.join("pkg/arch/PKGBUILD"), "pkgname=kresd\n");
        let mut proj = Project::load(temp.path()).unwrap();
        assert!(proj.templates().is_empty());

        proj.load_input(&unpacked).unwrap();
        assert_eq!(proj.templates().len(), 1);
        assert_eq!(proj.output_path(), temp.path().join("pkg"));
    }

    #[test]
    fn test_find_archives_by_name() {
        let temp = TempDir::new().unwrap();
        let proj = Project::load(temp.path()).unwrap();
        let dev = proj.dev_archive_path();
        write(&dev.join("kresd-1.0.tar.gz"), "a");
        write(&dev.join("kresd-1.0.tar.gz.asc"), "sig");
        write(&dev.join("other-1.0.tar.gz"), "b");

        let found = proj.find_archives_by_name("kresd", false).unwrap();
        assert_eq!(found, [dev.join("kresd-1.0.tar.gz")]);
        assert!(proj.find_archives_by_name("kresd", true).unwrap().is_empty());
    }

    #[test]
    fn test_no_vcs_means_no_checksum() {
        let temp = TempDir::new().unwrap();
        let proj = Project::load(temp.path()).unwrap();
        if proj.vcs().is_some() {
            // tempdir inside a git checkout
            return;
        }
        assert!(proj.checksum().unwrap().is_none());
        assert!(!proj.cache_enabled(true));
    }
}
