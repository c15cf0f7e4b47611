use std::path::PathBuf;
use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found in store: {name}")]
    NotFound { name: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store command failed to start ({command}): {source}")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store command returned non-zero exit ({command}) status={status:?}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("store command output was not valid UTF-8 ({command}): {source}")]
    NonUtf8Output {
        command: String,
        #[source]
        source: FromUtf8Error,
    },
    #[error("failed to read credentials file at {path}: {source}")]
    CredsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse credentials file at {path}: {source}")]
    CredsParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::StoreError;
    use std::error::Error;

    #[test]
    fn not_found_names_the_object() {
        let err = StoreError::NotFound {
            name: "index.json".to_string(),
        };
        assert_eq!(err.to_string(), "object not found in store: index.json");
    }

    #[test]
    fn command_failed_mentions_command_and_status() {
        let err = StoreError::CommandFailed {
            command: "aws s3 cp - s3://bucket/index.json".to_string(),
            status: Some(1),
            stdout: String::new(),
            stderr: "denied".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("aws s3 cp - s3://bucket/index.json"));
        assert!(rendered.contains("status=Some(1)"));
    }

    #[test]
    fn read_variant_keeps_the_io_source() {
        let err = StoreError::Read {
            path: "/tmp/results/index.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/results/index.json"));
    }
}
