// src/archive.rs

//! Source archive unpacking
//!
//! Upstream release tarballs are unpacked natively (tar + gzip, xz, bzip2
//! or zstd). A source archive must contain a single root directory, which
//! is where upstream-mode packaging templates are looked up.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compression of a tar archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
    Bzip2,
    Zstd,
}

impl Compression {
    /// Detect compression from the file name extension
    pub fn from_extension(path: &str) -> Option<Self> {
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(Self::Gzip)
        } else if path.ends_with(".tar.xz") || path.ends_with(".txz") {
            Some(Self::Xz)
        } else if path.ends_with(".tar.bz2") || path.ends_with(".tbz2") {
            Some(Self::Bzip2)
        } else if path.ends_with(".tar.zst") || path.ends_with(".tar.zstd") {
            Some(Self::Zstd)
        } else if path.ends_with(".tar") {
            Some(Self::None)
        } else {
            None
        }
    }

    /// Detect compression from magic bytes
    ///
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Bzip2: `42 5a 68` ("BZh")
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x1f, 0x8b]) {
            Some(Self::Gzip)
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Some(Self::Xz)
        } else if data.starts_with(b"BZh") {
            Some(Self::Bzip2)
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Some(Self::Zstd)
        } else if data.len() >= 262 && &data[257..262] == b"ustar" {
            Some(Self::None)
        } else {
            None
        }
    }
}

fn open_decoder(path: &Path) -> Result<Box<dyn Read>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 512];
    let n = read_up_to(&mut file, &mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let name = path.to_string_lossy();
    let compression = Compression::from_magic_bytes(&magic[..n])
        .or_else(|| Compression::from_extension(&name))
        .ok_or_else(|| {
            Error::InvalidArchiveFormat(format!("unsupported archive: {}", path.display()))
        })?;
    debug!("unpacking {} ({:?})", path.display(), compression);

    let reader = BufReader::new(file);
    Ok(match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        Compression::Zstd => Box::new(zstd::Decoder::new(reader)?),
    })
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Unpack an archive into `out_dir` and return the path of its root dir
///
/// The archive is expected to contain a single root directory. A previous
/// extraction of the same root dir is replaced.
pub fn unpack_archive(archive: &Path, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let staging = tempfile::Builder::new()
        .prefix(".unpack-")
        .tempdir_in(out_dir)?;

    let mut tar = tar::Archive::new(open_decoder(archive)?);
    tar.set_preserve_permissions(true);
    // entries escaping the destination (absolute or `..`) are skipped by unpack
    tar.unpack(staging.path()).map_err(|e| {
        Error::InvalidArchiveFormat(format!("failed to unpack {}: {}", archive.display(), e))
    })?;

    let roots = fs::read_dir(staging.path())?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    let root = match roots.as_slice() {
        [root] if root.is_dir() => root,
        _ => {
            return Err(Error::InvalidArchiveFormat(format!(
                "expected a single root dir but got {} files in root: {}",
                roots.len(),
                archive.display()
            )));
        }
    };

    let Some(root_name) = root.file_name() else {
        return Err(Error::InvalidArchiveFormat(archive.display().to_string()));
    };
    let target = out_dir.join(root_name);
    if target.exists() {
        debug!("removing previously unpacked: {}", target.display());
        fs::remove_dir_all(&target)?;
    }
    fs::rename(root, &target)?;
    Ok(target)
}
