//! Bucket-backed store driven through the `aws` CLI. Objects are written
//! with whole-object PUTs, so replacement is atomic on the service side.

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::creds::S3Creds;
use crate::error::StoreError;
use crate::store::DataStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Thin wrapper around the `aws` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCli {
    pub binary: PathBuf,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("aws"),
        }
    }
}

impl AwsCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn run<I, S>(
        &self,
        args: I,
        env: &[(&'static str, String)],
        stdin: Option<&str>,
    ) -> Result<AwsOutput, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let owned_args: Vec<OsString> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();

        let mut command = Command::new(&self.binary);
        for arg in &owned_args {
            command.arg(arg);
        }
        for (key, value) in env {
            command.env(key, value);
        }

        let rendered = render_command(&self.binary, &owned_args);
        let output = match stdin {
            Some(input) => {
                command
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
                let mut child = command.spawn().map_err(|source| StoreError::CommandIo {
                    command: rendered.clone(),
                    source,
                })?;
                if let Some(mut pipe) = child.stdin.take() {
                    pipe.write_all(input.as_bytes())
                        .map_err(|source| StoreError::CommandIo {
                            command: rendered.clone(),
                            source,
                        })?;
                }
                child
                    .wait_with_output()
                    .map_err(|source| StoreError::CommandIo {
                        command: rendered.clone(),
                        source,
                    })?
            }
            None => command.output().map_err(|source| StoreError::CommandIo {
                command: rendered.clone(),
                source,
            })?,
        };

        let stdout =
            String::from_utf8(output.stdout).map_err(|source| StoreError::NonUtf8Output {
                command: rendered.clone(),
                source,
            })?;
        let stderr =
            String::from_utf8(output.stderr).map_err(|source| StoreError::NonUtf8Output {
                command: rendered.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(StoreError::CommandFailed {
                command: rendered,
                status: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(AwsOutput { stdout, stderr })
    }
}

fn render_command(binary: &Path, args: &[OsString]) -> String {
    let mut rendered = binary.to_string_lossy().into_owned();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

/// Content type for the uploaded object, so pages served straight from the
/// bucket render in a browser.
fn content_type_for(name: &str) -> &'static str {
    if name.ends_with(".html") {
        "text/html"
    } else if name.ends_with(".json") {
        "application/json"
    } else {
        "text/plain"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Store {
    bucket: String,
    prefix: Option<String>,
    creds: Option<S3Creds>,
    public: bool,
    cli: AwsCli,
}

impl S3Store {
    /// `bucket_and_prefix` is the location with its `s3://` scheme already
    /// stripped, e.g. `results-bucket/cwr`.
    pub fn new(bucket_and_prefix: &str, creds: Option<S3Creds>, public: bool) -> Self {
        let (bucket, prefix) = match bucket_and_prefix.split_once('/') {
            Some((bucket, rest)) if !rest.trim_end_matches('/').is_empty() => {
                (bucket.to_string(), Some(rest.trim_end_matches('/').to_string()))
            }
            Some((bucket, _)) => (bucket.to_string(), None),
            None => (bucket_and_prefix.to_string(), None),
        };
        Self {
            bucket,
            prefix,
            creds,
            public,
            cli: AwsCli::default(),
        }
    }

    fn key_for(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{name}"),
            None => name.to_string(),
        }
    }

    pub fn object_uri(&self, name: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.key_for(name))
    }

    fn cli_env(&self) -> Vec<(&'static str, String)> {
        let mut env = Vec::new();
        if let Some(creds) = &self.creds {
            env.push(("AWS_ACCESS_KEY_ID", creds.access_key_id.clone()));
            env.push(("AWS_SECRET_ACCESS_KEY", creds.secret_access_key.clone()));
            if let Some(region) = &creds.region {
                env.push(("AWS_DEFAULT_REGION", region.clone()));
            }
        }
        env
    }

    fn run(&self, mut args: Vec<String>, stdin: Option<&str>) -> Result<AwsOutput, StoreError> {
        if let Some(endpoint) = self.creds.as_ref().and_then(|creds| creds.endpoint.as_ref()) {
            args.push("--endpoint-url".to_string());
            args.push(endpoint.clone());
        }
        self.cli.run(args, &self.cli_env(), stdin)
    }
}

impl DataStore for S3Store {
    fn exists(&self, name: &str) -> bool {
        let args = vec![
            "s3api".to_string(),
            "head-object".to_string(),
            "--bucket".to_string(),
            self.bucket.clone(),
            "--key".to_string(),
            self.key_for(name),
        ];
        match self.run(args, None) {
            Ok(_) => true,
            Err(err) => {
                debug!(object = name, error = %err, "head-object failed, treating as absent");
                false
            }
        }
    }

    fn read(&self, name: &str) -> Result<String, StoreError> {
        if !self.exists(name) {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }
        let args = vec![
            "s3".to_string(),
            "cp".to_string(),
            self.object_uri(name),
            "-".to_string(),
        ];
        Ok(self.run(args, None)?.stdout)
    }

    fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        let mut args = vec![
            "s3".to_string(),
            "cp".to_string(),
            "-".to_string(),
            self.object_uri(name),
            "--content-type".to_string(),
            content_type_for(name).to_string(),
        ];
        if self.public {
            args.push("--acl".to_string());
            args.push("public-read".to_string());
        }
        self.run(args, Some(content))?;
        debug!(object = name, uri = %self.object_uri(name), "uploaded object");
        Ok(())
    }
}
