//! S3 credentials file: a small TOML document with an `[s3]` table.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Creds {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CredsFile {
    s3: S3Creds,
}

pub fn parse_s3_creds(contents: &str) -> Result<S3Creds, toml::de::Error> {
    toml::from_str::<CredsFile>(contents).map(|file| file.s3)
}

pub fn load_s3_creds(path: impl AsRef<Path>) -> Result<S3Creds, StoreError> {
    let path_ref = path.as_ref();
    let body = fs::read_to_string(path_ref).map_err(|source| StoreError::CredsRead {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_s3_creds(&body).map_err(|source| StoreError::CredsParse {
        path: path_ref.to_path_buf(),
        source,
    })
}
