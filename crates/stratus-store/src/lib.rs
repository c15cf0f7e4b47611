pub mod creds;
pub mod error;
pub mod local;
pub mod s3;
pub mod store;

pub use creds::*;
pub use error::*;
pub use local::*;
pub use s3::*;
pub use store::*;

#[cfg(test)]
mod tests {
    use super::{DataStore, LocalStore, S3Store, StoreError};
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_store_types() {
        let _ = TypeId::of::<LocalStore>();
        let _ = TypeId::of::<S3Store>();
        let _ = TypeId::of::<StoreError>();
    }

    #[test]
    fn crate_root_reexports_the_factory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store: Box<dyn DataStore> =
            super::get(dir.path().to_str().expect("utf-8 path"), None, true).expect("get store");
        assert!(!store.exists("index.json"));
    }
}
