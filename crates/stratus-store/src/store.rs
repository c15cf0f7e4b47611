//! The datastore seam: everything durable goes through this trait, so the
//! engine never knows whether it is talking to a directory or a bucket.

use std::path::Path;

use crate::creds::load_s3_creds;
use crate::error::StoreError;
use crate::local::LocalStore;
use crate::s3::S3Store;

/// Durable object storage keyed by relative names like
/// `20171206/wiki-simple.json`.
pub trait DataStore: Send + Sync {
    /// True if an object with this name is present.
    fn exists(&self, name: &str) -> bool;

    /// Reads an object; absent objects fail with [`StoreError::NotFound`].
    fn read(&self, name: &str) -> Result<String, StoreError>;

    /// Creates or replaces an object. A reader never observes a partially
    /// written object.
    fn write(&self, name: &str, content: &str) -> Result<(), StoreError>;
}

/// Picks a backend from the location: `s3://bucket[/prefix]` selects the
/// bucket store, anything else is a local directory.
pub fn get(
    location: &str,
    s3_creds: Option<&Path>,
    s3_public: bool,
) -> Result<Box<dyn DataStore>, StoreError> {
    if let Some(bucket_and_prefix) = location.strip_prefix("s3://") {
        let creds = match s3_creds {
            Some(path) => Some(load_s3_creds(path)?),
            None => None,
        };
        Ok(Box::new(S3Store::new(bucket_and_prefix, creds, s3_public)))
    } else {
        Ok(Box::new(LocalStore::new(location)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_locations_resolve_to_a_working_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = get(dir.path().to_str().expect("utf-8 path"), None, true).expect("get store");

        assert!(!store.exists("index.json"));
        store
            .write("index.json", "{\"providers\": []}")
            .expect("write");
        assert!(store.exists("index.json"));
        assert_eq!(store.read("index.json").expect("read"), "{\"providers\": []}");
    }

    #[test]
    fn s3_locations_resolve_without_touching_the_network() {
        let store = get("s3://results-bucket/cwr", None, false).expect("get store");
        // Construction alone must not shell out.
        let _ = &store;
    }

    #[test]
    fn s3_location_with_missing_creds_file_fails() {
        let err = get(
            "s3://results-bucket",
            Some(Path::new("/definitely/missing/creds.toml")),
            true,
        )
        .err()
        .expect("missing creds file");
        assert!(matches!(err, StoreError::CredsRead { .. }));
    }
}
