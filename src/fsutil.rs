// src/fsutil.rs

//! Filesystem helpers shared by pipeline stages and package styles

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Remove a directory if it exists and create it empty
pub fn recreate_dir(dir: &Path, what: &str) -> Result<()> {
    remove_dir(dir, what)?;
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Remove a directory tree if it exists
pub fn remove_dir(dir: &Path, what: &str) -> Result<()> {
    if dir.exists() {
        info!("removing existing {}: {}", what, dir.display());
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

/// Copy a file into a directory, keeping its name
pub fn copy_into(src: &Path, dir: &Path) -> Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a file path: {}", src.display()),
        )
    })?;
    let dst = dir.join(name);
    copy_file(src, &dst)?;
    Ok(dst)
}

/// Copy a file, creating parent directories as needed
///
/// Copying a file onto itself is a no-op.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if same_file(src, dst) {
        debug!("file already in place: {}", dst.display());
        return Ok(());
    }
    debug!("copying file: {} -> {}", src.display(), dst.display());
    fs::copy(src, dst)?;
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy paths into `dst`, skipping those already located there
///
/// Returns the paths of the files in `dst`.
pub fn copy_paths(paths: &[PathBuf], dst: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dst)?;
    let dst_full = fs::canonicalize(dst)?;
    let mut new_paths = Vec::with_capacity(paths.len());
    for path in paths {
        let parent = path.parent().and_then(|p| fs::canonicalize(p).ok());
        if parent.as_deref() == Some(dst_full.as_path()) {
            new_paths.push(path.clone());
        } else {
            new_paths.push(copy_into(path, dst)?);
        }
    }
    Ok(new_paths)
}

/// Recursively copy a directory tree, preserving symlinks
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Regular files in `dir` (not recursive) whose names satisfy `pred`, sorted
pub fn files_matching(dir: &Path, pred: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && pred(name)
        {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recreate_dir_drops_stale_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("build/deb/foo-1.0-1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale.deb"), "old").unwrap();

        recreate_dir(&dir, "build dir").unwrap();
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_paths_skips_files_in_place() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let inside = out.join("a.dsc");
        let outside = temp.path().join("b.tar.gz");
        fs::write(&inside, "a").unwrap();
        fs::write(&outside, "b").unwrap();

        let copied = copy_paths(&[inside.clone(), outside], &out).unwrap();
        assert_eq!(copied, vec![inside, out.join("b.tar.gz")]);
        assert!(out.join("b.tar.gz").exists());
    }

    #[test]
    fn test_copy_file_onto_itself_keeps_content() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("foo-1.0.tar.gz");
        fs::write(&file, "archive bytes").unwrap();

        copy_file(&file, &temp.path().join("./foo-1.0.tar.gz")).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "archive bytes");
    }

    #[test]
    fn test_copy_dir() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub/file"), "x").unwrap();
        std::os::unix::fs::symlink("sub/file", src.join("link")).unwrap();

        let dst = temp.path().join("dst");
        copy_dir(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("sub/file")).unwrap(), "x");
        assert!(fs::symlink_metadata(dst.join("link")).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_files_matching() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.rpm"), "").unwrap();
        fs::write(temp.path().join("a.rpm"), "").unwrap();
        fs::write(temp.path().join("a.log"), "").unwrap();
        fs::create_dir(temp.path().join("dir.rpm")).unwrap();

        let rpms = files_matching(temp.path(), |n| n.ends_with(".rpm")).unwrap();
        let names: Vec<_> = rpms.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, ["a.rpm", "b.rpm"]);
    }
}
