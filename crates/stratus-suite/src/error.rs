use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("test suite failed to start ({command}): {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("test suite output was not valid UTF-8 ({command}, {stream}): {source}")]
    NonUtf8Output {
        command: String,
        stream: &'static str,
        #[source]
        source: FromUtf8Error,
    },
}
