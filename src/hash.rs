// src/hash.rs

//! Content hashing for cache entries and source archives
//!
//! Cache entries store a short checksum per result file: the first
//! [`CHECKSUM_LEN`] hex characters of the file's SHA-256 digest. Files are
//! streamed in fixed-size chunks so hashing large archives stays
//! memory-bounded.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of hex characters kept in cache checksums
pub const CHECKSUM_LEN: usize = 20;

/// Read chunk size for streaming hashes
const CHUNK_SIZE: usize = 4096;

/// Compute the full SHA-256 hex digest of data from a reader
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the full SHA-256 hex digest of a byte slice
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute the full SHA-256 hex digest of a file
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}

/// Compute the truncated checksum used to validate cache entries
pub fn file_checksum(path: &Path) -> io::Result<String> {
    let mut digest = sha256_file(path)?;
    digest.truncate(CHECKSUM_LEN);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256(b"Hello, World!"),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_reader_matches_slice() {
        let data = vec![7u8; CHUNK_SIZE * 3 + 17];
        let from_reader = sha256_reader(&mut data.as_slice()).unwrap();
        assert_eq!(from_reader, sha256(&data));
    }

    #[test]
    fn test_file_checksum_is_truncated_and_stable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("foo-1.0.tar.gz");
        fs::write(&path, b"archive contents").unwrap();

        let first = file_checksum(&path).unwrap();
        let second = file_checksum(&path).unwrap();
        assert_eq!(first.len(), CHECKSUM_LEN);
        assert_eq!(first, second);
        assert!(sha256(b"archive contents").starts_with(&first));
    }

    #[test]
    fn test_file_checksum_changes_on_single_byte() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data");
        fs::write(&path, b"abcdef").unwrap();
        let before = file_checksum(&path).unwrap();

        fs::write(&path, b"abcdeg").unwrap();
        let after = file_checksum(&path).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_file_checksum_missing_file() {
        assert!(file_checksum(Path::new("/nonexistent/apkg/file")).is_err());
    }
}
