//! Persistent storage for exported result records.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{GfcError, Result};

/// A flat namespace of byte objects addressed by slash-separated paths.
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any previous content.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read an object.
    fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Paths of every object under the directory `prefix`, sorted.
    ///
    /// `prefix` names whole path segments: `exports/run-1` lists
    /// `exports/run-1/1_1.csv` but not `exports/run-10/1_1.csv`. An empty
    /// prefix lists everything.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Whether `path` lies under the directory `prefix`.
pub fn is_under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

/// An [`ObjectStore`] backed by a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if part == "." || part == ".." {
                return Err(GfcError::ObjectNotFound(path.to_string()));
            }
            resolved.push(part);
        }
        Ok(resolved)
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
        Ok(())
    }
}

impl ObjectStore for DirectoryObjectStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        debug!(path, bytes = bytes.len(), "stored object");
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        if !target.is_file() {
            return Err(GfcError::ObjectNotFound(path.to_string()));
        }
        Ok(fs::read(target)?)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        if self.root.is_dir() {
            self.collect(&self.root, &mut out)?;
        }
        out.retain(|p| is_under_prefix(p, prefix));
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path()).unwrap();

        store.put("run-a/2_1.csv", b"two").unwrap();
        store.put("run-a/1_0.csv", b"one").unwrap();
        store.put("run-b/1_0.csv", b"other").unwrap();

        assert_eq!(store.get("run-a/2_1.csv").unwrap(), b"two");
        assert_eq!(
            store.list("run-a/").unwrap(),
            vec!["run-a/1_0.csv".to_string(), "run-a/2_1.csv".to_string()]
        );
        assert_eq!(store.list("").unwrap().len(), 3);
    }

    #[test]
    fn test_list_matches_whole_segments() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path()).unwrap();

        store.put("exports/run-1/1_1.csv", b"mine").unwrap();
        store.put("exports/run-10/2_1.csv", b"other run").unwrap();
        store.put("exports/run-1.csv", b"sibling file").unwrap();

        let expected = vec!["exports/run-1/1_1.csv".to_string()];
        assert_eq!(store.list("exports/run-1").unwrap(), expected);
        assert_eq!(store.list("exports/run-1/").unwrap(), expected);
        assert_eq!(store.list("exports").unwrap().len(), 3);
    }

    #[test]
    fn test_is_under_prefix() {
        assert!(is_under_prefix("a/b/c.csv", "a/b"));
        assert!(is_under_prefix("a/b/c.csv", "a/b/"));
        assert!(is_under_prefix("a/b/c.csv", ""));
        assert!(!is_under_prefix("a/bc/d.csv", "a/b"));
        assert!(!is_under_prefix("a/b", "a/b"));
    }

    #[test]
    fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path()).unwrap();
        assert!(matches!(store.get("nope.csv"), Err(GfcError::ObjectNotFound(_))));
        assert!(store.get("../escape").is_err());
    }
}
