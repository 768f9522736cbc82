// src/template.rs

//! Package templates
//!
//! A package template is a directory under `distro/pkg/` holding the
//! native packaging files for one package style (`debian/`, `*.spec`,
//! `PKGBUILD`, `default.nix`, ...). Text files are rendered as Jinja
//! templates with the [`TemplateEnv`] variables; `.patch` files and
//! binary files are copied verbatim. Every output file keeps the
//! permission bits of its source.

use crate::error::{Error, Result};
use crate::pkgstyle::{PackageStyle, StyleRegistry};
use minijinja::Environment;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Variables available in package templates
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateEnv {
    pub name: String,
    pub version: String,
    pub release: String,
    pub nvr: String,
    pub distro: String,
    /// Style specific variables such as `src_hash`
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl TemplateEnv {
    /// Copy of the environment with an extra variable set
    pub fn with_var(&self, key: &str, value: impl Into<String>) -> Self {
        let mut env = self.clone();
        env.extra.insert(key.to_string(), value.into());
        env
    }
}

/// A packaging template directory bound to its package style
#[derive(Clone)]
pub struct PackageTemplate {
    path: PathBuf,
    style: Arc<dyn PackageStyle>,
}

impl fmt::Debug for PackageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageTemplate")
            .field("path", &self.path)
            .field("style", &self.style.name())
            .finish()
    }
}

impl PackageTemplate {
    pub fn new(path: impl Into<PathBuf>, style: Arc<dyn PackageStyle>) -> Self {
        Self {
            path: path.into(),
            style,
        }
    }

    /// Bind a directory to the first style that recognizes it
    pub fn detect(path: &Path, registry: &StyleRegistry) -> Option<Self> {
        registry
            .for_template(path)
            .map(|style| Self::new(path, style))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn style(&self) -> &Arc<dyn PackageStyle> {
        &self.style
    }

    /// Canonical package name declared by the template
    pub fn name(&self) -> Result<String> {
        self.style.template_name(&self.path)
    }

    /// Whether this template's style handles the given distro
    pub fn supports_distro(&self, distro: &str) -> bool {
        self.style.matches_distro(distro)
    }

    /// Render the template tree into `out_dir`
    pub fn render(&self, out_dir: &Path, env: &TemplateEnv) -> Result<()> {
        info!(
            "rendering package template: {} -> {}",
            self.path.display(),
            out_dir.display()
        );
        render_tree(&self.path, out_dir, env)
    }
}

/// Render every file below `src` into the same relative path below `dst`
pub fn render_tree(src: &Path, dst: &Path, env: &TemplateEnv) -> Result<()> {
    let mut jinja = Environment::new();
    jinja.set_keep_trailing_newline(true);

    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        let source = entry.path();
        match read_renderable(source)? {
            Some(text) => {
                debug!("rendering file: {} -> {}", source.display(), target.display());
                let rendered = jinja
                    .render_str(&text, env)
                    .map_err(|e| Error::TemplateRenderFailed {
                        path: source.to_path_buf(),
                        reason: e.to_string(),
                    })?;
                fs::write(&target, rendered)?;
            }
            None => {
                debug!(
                    "copying file without render: {} -> {}",
                    source.display(),
                    target.display()
                );
                fs::copy(source, &target)?;
            }
        }
        fs::set_permissions(&target, fs::metadata(source)?.permissions())?;
    }
    Ok(())
}

/// File content to render, or None when the file is copied as is
fn read_renderable(path: &Path) -> Result<Option<String>> {
    if path.extension().is_some_and(|ext| ext == "patch") {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    Ok(String::from_utf8(bytes).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn env() -> TemplateEnv {
        TemplateEnv {
            name: "foo".into(),
            version: "1.2.3".into(),
            release: "1".into(),
            nvr: "foo-1.2.3-1".into(),
            distro: "fedora-40".into(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_render_substitutes_variables() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tpl");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(
            src.join("foo.spec"),
            "Name: {{ name }}\nVersion: {{ version }}\nRelease: {{ release }}\n",
        )
        .unwrap();
        fs::write(src.join("sub/notes"), "{{ nvr }} on {{ distro }}").unwrap();

        let out = temp.path().join("out");
        render_tree(&src, &out, &env()).unwrap();

        assert_eq!(
            fs::read_to_string(out.join("foo.spec")).unwrap(),
            "Name: foo\nVersion: 1.2.3\nRelease: 1\n"
        );
        assert_eq!(
            fs::read_to_string(out.join("sub/notes")).unwrap(),
            "foo-1.2.3-1 on fedora-40"
        );
    }

    #[test]
    fn test_patch_files_are_not_rendered() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tpl");
        fs::create_dir_all(&src).unwrap();
        let patch = "--- a\n+++ b\n@@ {{ not a var }}\n";
        fs::write(src.join("fix.patch"), patch).unwrap();

        let out = temp.path().join("out");
        render_tree(&src, &out, &env()).unwrap();
        assert_eq!(fs::read_to_string(out.join("fix.patch")).unwrap(), patch);
    }

    #[test]
    fn test_binary_files_are_copied() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tpl");
        fs::create_dir_all(&src).unwrap();
        let blob = [0xffu8, 0xfe, 0x00, 0x7b, 0x7b];
        fs::write(src.join("logo.bin"), blob).unwrap();

        let out = temp.path().join("out");
        render_tree(&src, &out, &env()).unwrap();
        assert_eq!(fs::read(out.join("logo.bin")).unwrap(), blob);
    }

    #[test]
    fn test_permissions_preserved() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tpl");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("rules"), "#!/usr/bin/make -f\n").unwrap();
        fs::set_permissions(src.join("rules"), fs::Permissions::from_mode(0o755)).unwrap();

        let out = temp.path().join("out");
        render_tree(&src, &out, &env()).unwrap();
        let mode = fs::metadata(out.join("rules")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_extra_vars_and_syntax_errors() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tpl");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("default.nix"), "sha256 = \"{{ src_hash }}\";").unwrap();

        let out = temp.path().join("out");
        render_tree(&src, &out, &env().with_var("src_hash", "abc")).unwrap();
        assert_eq!(
            fs::read_to_string(out.join("default.nix")).unwrap(),
            "sha256 = \"abc\";"
        );

        fs::write(src.join("broken"), "{% if %}").unwrap();
        let err = render_tree(&src, &temp.path().join("out2"), &env()).unwrap_err();
        assert!(matches!(err, Error::TemplateRenderFailed { .. }));
    }
}
