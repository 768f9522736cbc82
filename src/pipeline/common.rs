// src/pipeline/common.rs

//! Helpers shared by pipeline stages

use crate::error::{Error, Result};
use crate::fsutil::copy_paths;
use crate::project::Project;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File list name meaning standard input
pub const STDIN_LIST: &str = "-";

/// Cached results of a stage, copied into `result_dir` when given
pub fn get_cached_paths(
    proj: &mut Project,
    namespace: &str,
    key: &str,
    result_dir: Option<&Path>,
) -> Result<Option<Vec<PathBuf>>> {
    let Some(paths) = proj.cache().get(namespace, key)? else {
        return Ok(None);
    };
    if paths.is_empty() {
        return Ok(None);
    }
    match result_dir {
        Some(dir) => copy_paths(&paths, dir).map(Some),
        None => Ok(Some(paths)),
    }
}

/// Lines of file lists, one entry per line
///
/// `-` reads standard input and may be given at most once. The second
/// value tells whether stdin was read.
pub fn read_file_lists(file_lists: &[PathBuf]) -> Result<(Vec<String>, bool)> {
    read_file_lists_from(file_lists, io::stdin().lock())
}

pub(crate) fn read_file_lists_from(
    file_lists: &[PathBuf],
    stdin: impl BufRead,
) -> Result<(Vec<String>, bool)> {
    let stdin_count = file_lists.iter().filter(|f| is_stdin(f)).count();
    if stdin_count > 1 {
        return Err(Error::InvalidInput(
            "requested to read stdin multiple times".to_string(),
        ));
    }

    let mut entries = vec![];
    let mut stdin = Some(stdin);
    for list in file_lists {
        if is_stdin(list) {
            if let Some(reader) = stdin.take() {
                debug!("reading input list from stdin");
                entries.extend(read_lines(reader)?);
            }
        } else {
            debug!("reading input list: {}", list.display());
            let file = File::open(list).map_err(|e| {
                Error::InvalidInput(format!("unable to read file list {}: {e}", list.display()))
            })?;
            entries.extend(read_lines(BufReader::new(file))?);
        }
    }
    Ok((entries, stdin_count > 0))
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == STDIN_LIST
}

fn read_lines(reader: impl BufRead) -> Result<Vec<String>> {
    let mut lines = vec![];
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Input files given directly plus those listed in file lists
pub fn parse_input_files(files: &[PathBuf], file_lists: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let (listed, _) = read_file_lists(file_lists)?;
    Ok(files
        .iter()
        .cloned()
        .chain(listed.into_iter().map(PathBuf::from))
        .collect())
}

/// Fail unless at least one input file was given and all of them exist
pub fn ensure_input_files(files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        return Err(Error::InvalidInput("no input file(s) specified".to_string()));
    }
    if let Some(missing) = files.iter().find(|f| !f.exists()) {
        return Err(Error::InvalidInput(format!(
            "input file not found: {}",
            missing.display()
        )));
    }
    Ok(())
}

/// Fail when a supplied source package doesn't exist
pub(crate) fn ensure_srcpkg_files(srcpkgs: &[PathBuf]) -> Result<()> {
    match srcpkgs.iter().find(|f| !f.exists()) {
        Some(missing) => Err(Error::SourcePackageNotFound(missing.display().to_string())),
        None => Ok(()),
    }
}

/// Fail when a stage reported success but some results don't exist
pub(crate) fn ensure_results(results: &[PathBuf], what: &str, location: &Path) -> Result<()> {
    if results.is_empty() {
        return Err(Error::UnexpectedCommandOutput(format!(
            "{what} build reported success but there are no results in: {}",
            location.display()
        )));
    }
    if let Some(missing) = results.iter().find(|p| !p.exists()) {
        return Err(Error::UnexpectedCommandOutput(format!(
            "{what} build reported success but result is missing: {}",
            missing.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_file_lists() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("list.txt");
        fs::write(&list, "a.deb\n\n  b.deb  \n").unwrap();

        let stdin = io::Cursor::new("c.deb\n");
        let (entries, from_stdin) =
            read_file_lists_from(&[list.clone(), PathBuf::from("-")], stdin).unwrap();
        assert_eq!(entries, ["a.deb", "b.deb", "c.deb"]);
        assert!(from_stdin);

        let (entries, from_stdin) = read_file_lists_from(&[list], io::empty()).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!from_stdin);
    }

    #[test]
    fn test_stdin_twice_is_invalid() {
        let lists = [PathBuf::from("-"), PathBuf::from("-")];
        let err = read_file_lists_from(&lists, io::empty()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_ensure_input_files() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("foo-1.0.tar.gz");
        fs::write(&present, "x").unwrap();

        assert!(ensure_input_files(&[present.clone()]).is_ok());
        assert!(matches!(ensure_input_files(&[]), Err(Error::InvalidInput(_))));
        let err = ensure_input_files(&[present, temp.path().join("missing")]).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_ensure_results() {
        let temp = TempDir::new().unwrap();
        let err = ensure_results(&[], "source package", temp.path()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedCommandOutput(_)));
        let err = ensure_results(&[temp.path().join("x.dsc")], "source package", temp.path())
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedCommandOutput(_)));
    }
}
