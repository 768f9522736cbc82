// src/cache.rs

//! Project result cache
//!
//! Maps `(namespace, key)` to the list of result files a pipeline stage
//! produced, e.g. `("archive/dev", <project checksum>)` or
//! `("pkg/debian-12", <source package checksum>)`.
//!
//! Each recorded file carries a short content checksum. An entry is only
//! trusted when every file still exists and still hashes to the recorded
//! value; anything else drops the whole entry and the lookup becomes a miss.
//!
//! The backing JSON document is read lazily on first use and rewritten in
//! full after every mutation. There is no locking: concurrent apkg runs
//! against the same project race and the last writer wins.

use crate::error::Result;
use crate::hash::file_checksum;
use crate::project::Vcs;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One cached result file: `[absolute path, checksum]`
pub type CacheEntry = (String, String);

/// namespace -> key -> result files
type CacheMap = BTreeMap<String, BTreeMap<String, Vec<CacheEntry>>>;

/// On-disk content cache of a single project
#[derive(Debug)]
pub struct ProjectCache {
    path: PathBuf,
    loaded: bool,
    entries: CacheMap,
}

impl ProjectCache {
    /// Create a cache backed by the given JSON file (not read until used)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: false,
            entries: CacheMap::new(),
        }
    }

    /// Path of the backing cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tell (and log) whether caching should be used
    ///
    /// Caching needs both the caller's consent and a detected VCS, since
    /// dev cache keys are derived from VCS state.
    pub fn enabled(&self, use_cache: bool, vcs: Option<Vcs>) -> bool {
        if !use_cache {
            debug!("cache DISABLED");
            return false;
        }
        match vcs {
            Some(vcs) => {
                debug!("{} VCS detected -> cache ENABLED", vcs);
                true
            }
            None => {
                debug!("VCS not detected -> cache DISABLED");
                false
            }
        }
    }

    /// Look up a cache entry, validating every file it references
    pub fn get(&mut self, namespace: &str, key: &str) -> Result<Option<Vec<PathBuf>>> {
        debug!("cache query for {}: {}", namespace, key);
        self.ensure_loaded();

        let Some(entry) = self.entries.get(namespace).and_then(|ns| ns.get(key)) else {
            return Ok(None);
        };

        let mut paths = Vec::with_capacity(entry.len());
        let mut valid = !entry.is_empty();
        for (file, checksum) in entry {
            let path = PathBuf::from(file);
            if !path.exists() {
                info!("removing missing file from cache: {}", path.display());
                valid = false;
                break;
            }
            match file_checksum(&path) {
                Ok(real) if &real == checksum => paths.push(path),
                _ => {
                    info!("removing invalid cache entry: {}", path.display());
                    valid = false;
                    break;
                }
            }
        }

        if !valid {
            self.delete(namespace, key)?;
            return Ok(None);
        }
        Ok(Some(paths))
    }

    /// Record result files under a key, replacing any previous entry
    pub fn update<P: AsRef<Path>>(&mut self, namespace: &str, key: &str, paths: &[P]) -> Result<()> {
        debug_assert!(!key.is_empty(), "cache key must not be empty");
        self.ensure_loaded();

        let mut entry = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let absolute = std::path::absolute(path)?;
            entry.push((
                absolute.to_string_lossy().into_owned(),
                file_checksum(path)?,
            ));
        }
        debug!(
            "cache update for {}: {} -> {:?}",
            namespace,
            key,
            entry.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>()
        );

        self.entries
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        self.save()
    }

    /// Remove a cache entry
    pub fn delete(&mut self, namespace: &str, key: &str) -> Result<()> {
        self.ensure_loaded();
        if let Some(ns) = self.entries.get_mut(namespace) {
            ns.remove(key);
        }
        self.save()
    }

    /// Number of entries in a namespace
    pub fn len(&mut self, namespace: &str) -> usize {
        self.ensure_loaded();
        self.entries.get(namespace).map_or(0, BTreeMap::len)
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        self.entries = self.load();
    }

    /// Read the cache file; a missing or corrupt file is an empty cache
    fn load(&self) -> CacheMap {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => {
                debug!("cache not found: {}", self.path.display());
                return CacheMap::new();
            }
        };
        debug!("loading cache: {}", self.path.display());
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("ignoring corrupt cache {}: {}", self.path.display(), e);
            CacheMap::new()
        })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.entries)
            .map_err(|e| std::io::Error::other(format!("failed to serialize cache: {e}")))?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ProjectCache, Vec<PathBuf>) {
        let temp = TempDir::new().unwrap();
        let cache = ProjectCache::new(temp.path().join("pkg/.cache.json"));
        let a = temp.path().join("foo-1.0.dsc");
        let b = temp.path().join("foo-1.0.orig.tar.gz");
        fs::write(&a, b"Source: foo").unwrap();
        fs::write(&b, b"tarball").unwrap();
        (temp, cache, vec![a, b])
    }

    #[test]
    fn test_cache_miss() {
        let (_temp, mut cache, _) = setup();
        assert!(cache.get("archive/dev", "abc").unwrap().is_none());
    }

    #[test]
    fn test_update_then_get() {
        let (_temp, mut cache, paths) = setup();
        cache.update("srcpkg/dev/debian-12", "key1", &paths).unwrap();

        let cached = cache.get("srcpkg/dev/debian-12", "key1").unwrap().unwrap();
        assert_eq!(cached, paths);
        assert!(cache.path().exists());
    }

    #[test]
    fn test_persisted_across_instances() {
        let (_temp, mut cache, paths) = setup();
        cache.update("archive/upstream", "https://x/foo-1.0.tar.gz", &paths[..1]).unwrap();

        let mut reloaded = ProjectCache::new(cache.path());
        let cached = reloaded
            .get("archive/upstream", "https://x/foo-1.0.tar.gz")
            .unwrap()
            .unwrap();
        assert_eq!(cached, paths[..1]);
    }

    #[test]
    fn test_file_format() {
        let (_temp, mut cache, paths) = setup();
        cache.update("pkg/arch", "k", &paths[..1]).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(cache.path()).unwrap()).unwrap();
        let entry = &json["pkg/arch"]["k"][0];
        assert_eq!(entry[0].as_str().unwrap(), paths[0].to_str().unwrap());
        assert_eq!(entry[1].as_str().unwrap().len(), 20);
    }

    #[test]
    fn test_deleted_file_invalidates_entry() {
        let (_temp, mut cache, paths) = setup();
        cache.update("archive/dev", "k", &paths).unwrap();
        fs::remove_file(&paths[1]).unwrap();

        assert!(cache.get("archive/dev", "k").unwrap().is_none());
        assert_eq!(cache.len("archive/dev"), 0);

        let dump = fs::read_to_string(cache.path()).unwrap();
        assert!(!dump.contains("foo-1.0.dsc"));
    }

    #[test]
    fn test_modified_file_invalidates_entry() {
        let (_temp, mut cache, paths) = setup();
        cache.update("archive/dev", "k", &paths).unwrap();
        fs::write(&paths[0], b"Source: bar").unwrap();

        assert!(cache.get("archive/dev", "k").unwrap().is_none());
        assert!(cache.get("archive/dev", "k").unwrap().is_none());
    }

    #[test]
    fn test_update_overwrites() {
        let (_temp, mut cache, paths) = setup();
        cache.update("archive/dev", "k", &paths).unwrap();
        cache.update("archive/dev", "k", &paths[1..]).unwrap();
        assert_eq!(cache.get("archive/dev", "k").unwrap().unwrap(), paths[1..]);
    }

    #[test]
    fn test_corrupt_cache_file_is_empty() {
        let (_temp, mut cache, paths) = setup();
        fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        fs::write(cache.path(), b"{ not json").unwrap();

        assert!(cache.get("archive/dev", "k").unwrap().is_none());
        cache.update("archive/dev", "k", &paths).unwrap();
        assert!(cache.get("archive/dev", "k").unwrap().is_some());
    }

    #[test]
    fn test_enabled_requires_vcs() {
        let cache = ProjectCache::new("/tmp/unused.json");
        assert!(cache.enabled(true, Some(Vcs::Git)));
        assert!(!cache.enabled(true, None));
        assert!(!cache.enabled(false, Some(Vcs::Git)));
    }
}
