//! Filesystem-backed store. Writes go to a temporary sibling first and are
//! renamed over the target, so a crashed run leaves the old object intact.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;
use crate::store::DataStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl DataStore for LocalStore {
    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    fn read(&self, name: &str) -> Result<String, StoreError> {
        let path = self.resolve(name);
        fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    name: name.to_string(),
                }
            } else {
                StoreError::Read { path, source }
            }
        })
    }

    fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let staging = staging_path(&path);
        fs::write(&staging, content).map_err(|source| StoreError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Write { path, source })?;
        debug!(object = name, "wrote local object");
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(".tmp");
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LocalStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, store) = mk_store();
        store.write("index.json", "{}").expect("write");
        assert_eq!(store.read("index.json").expect("read"), "{}");
    }

    #[test]
    fn read_of_missing_object_is_not_found() {
        let (_dir, store) = mk_store();
        let err = store.read("missing.json").expect_err("missing object");
        assert!(matches!(err, StoreError::NotFound { name } if name == "missing.json"));
    }

    #[test]
    fn write_creates_parent_directories() {
        let (dir, store) = mk_store();
        store
            .write("20171206/wiki-simple.json", "{\"test_id\": \"11\"}")
            .expect("nested write");
        assert!(dir.path().join("20171206/wiki-simple.json").is_file());
        assert!(store.exists("20171206/wiki-simple.json"));
    }

    #[test]
    fn write_replaces_existing_content() {
        let (_dir, store) = mk_store();
        store.write("index.json", "old").expect("first write");
        store.write("index.json", "new").expect("second write");
        assert_eq!(store.read("index.json").expect("read"), "new");
    }

    #[test]
    fn write_leaves_no_staging_file_behind() {
        let (dir, store) = mk_store();
        store.write("index.json", "{}").expect("write");
        assert!(!dir.path().join("index.json.tmp").exists());
    }

    #[test]
    fn exists_is_false_for_directories() {
        let (dir, store) = mk_store();
        fs::create_dir_all(dir.path().join("20171206")).expect("mkdir");
        assert!(!store.exists("20171206"));
    }
}
