//! On-disk store for completed query results
//!
//! Stores one JSON file per cache key, holding the ordered list of result
//! batches for a fully resolved query. Presence of a file substitutes for a
//! validity check: there is no checksum, TTL, or schema-version guard, and
//! concurrent writers to the same key are not coordinated. Both are deliberate
//! simplicity trade-offs; stale entries must be removed by deleting the file.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::data::Batch;

/// Manages reading and writing cached query results on disk
///
/// Results are stored as JSON files in a flat directory, one file per cache
/// key. Entries are written only once a query's entire page sequence has been
/// collected, so a present file always holds a complete result set.
#[derive(Debug, Clone)]
pub struct ResultCache {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl ResultCache {
    /// Creates a cache in the XDG-compliant cache directory
    /// (`~/.cache/ihr/` on Linux, or the platform equivalent).
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no
    /// home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "ihr")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a cache rooted at a custom directory.
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the path to the cache file for the given key
    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Whether a complete result set is stored for the given key
    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }

    /// Writes the full ordered batch sequence for a resolved query.
    ///
    /// Creates the cache directory if it does not exist. Callers must only
    /// write once every page has been collected; partial results are never
    /// persisted.
    pub fn write(&self, key: &str, batches: &[Batch]) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        let json = serde_json::to_string(batches)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(self.entry_path(key), json)
    }

    /// Reads the stored batch sequence for the given key.
    ///
    /// Returns `None` if no entry exists or the file cannot be parsed.
    pub fn read(&self, key: &str) -> Option<Vec<Batch>> {
        let content = fs::read_to_string(self.entry_path(key)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_cache() -> (ResultCache, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = ResultCache::with_dir(temp_dir.path().to_path_buf());
        (cache, temp_dir)
    }

    fn sample_batches() -> Vec<Batch> {
        vec![
            vec![json!({"asn": 2907, "hege": 0.42}), json!({"asn": 174, "hege": 0.11})],
            vec![json!({"asn": 3356, "hege": 0.07})],
        ]
    }

    #[test]
    fn test_write_creates_file_in_cache_directory() {
        let (cache, temp_dir) = create_test_cache();

        cache
            .write("hegemony_originasn2907", &sample_batches())
            .expect("Write should succeed");

        let expected_path = temp_dir.path().join("hegemony_originasn2907.json");
        assert!(expected_path.exists(), "Cache file should exist");

        let content = fs::read_to_string(&expected_path).expect("Should read file");
        assert!(content.contains("2907"));
        assert!(content.contains("hege"));
    }

    #[test]
    fn test_read_returns_none_for_missing_key() {
        let (cache, _temp_dir) = create_test_cache();
        assert!(cache.read("nonexistent_key").is_none());
        assert!(!cache.contains("nonexistent_key"));
    }

    #[test]
    fn test_roundtrip_preserves_batch_order_and_contents() {
        let (cache, _temp_dir) = create_test_cache();
        let original = sample_batches();

        cache.write("roundtrip_key", &original).expect("Write should succeed");
        let stored = cache.read("roundtrip_key").expect("Should read cache");

        assert_eq!(stored, original, "Batches should survive roundtrip exactly");
    }

    #[test]
    fn test_contains_after_write() {
        let (cache, _temp_dir) = create_test_cache();
        assert!(!cache.contains("key"));
        cache.write("key", &sample_batches()).expect("Write should succeed");
        assert!(cache.contains("key"));
    }

    #[test]
    fn test_write_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache").join("dir");
        let cache = ResultCache::with_dir(nested_path.clone());

        cache.write("nested_key", &sample_batches()).expect("Write should succeed");

        assert!(nested_path.exists(), "Nested directory should be created");
        assert!(nested_path.join("nested_key.json").exists(), "Cache file should exist");
    }

    #[test]
    fn test_overwrite_existing_entry() {
        let (cache, _temp_dir) = create_test_cache();
        let first = vec![vec![json!({"v": 1})]];
        let second = vec![vec![json!({"v": 2})], vec![json!({"v": 3})]];

        cache.write("overwrite_key", &first).expect("First write should succeed");
        cache.write("overwrite_key", &second).expect("Second write should succeed");

        let stored = cache.read("overwrite_key").expect("Should read cache");
        assert_eq!(stored, second, "Cache should contain latest data");
    }

    #[test]
    fn test_read_returns_none_for_corrupt_entry() {
        let (cache, temp_dir) = create_test_cache();
        fs::write(temp_dir.path().join("corrupt.json"), "{ not json").expect("Should write file");
        assert!(cache.read("corrupt").is_none());
    }

    #[test]
    fn test_new_uses_project_cache_path() {
        if let Some(cache) = ResultCache::new() {
            let path_str = cache.cache_dir.to_string_lossy().into_owned();
            assert!(path_str.contains("ihr"), "Cache path should contain project name");
        }
        // Passes if new() returns None (e.g., no home directory in CI)
    }
}
