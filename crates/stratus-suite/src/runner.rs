use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::SuiteError;

/// Everything the external suite needs to know for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteOptions {
    /// Environment name the suite deploys into.
    pub environment: String,
    /// Directory holding the bundle or charm under test.
    pub testdir: Option<PathBuf>,
    /// Bundle file within the test directory.
    pub bundle: Option<String>,
    /// Deployment name within the bundle file.
    pub deployment: Option<String>,
    /// Override for the suite's own tests.yaml.
    pub tests_yaml: Option<PathBuf>,
    /// Glob restricting which test files run.
    pub test_pattern: Option<String>,
    /// Explicit test names to run, passed as trailing positionals. Empty
    /// means the suite discovers its own tests.
    pub tests: Vec<String>,
    /// Test names to skip.
    pub exclude: Vec<String>,
    pub log_level: String,
    /// Stop at the first failing test.
    pub failfast: bool,
    /// Skip tests the suite would infer from charm metadata.
    pub skip_implicit: bool,
    /// Leave the deployment running after the suite finishes.
    pub no_destroy: bool,
    pub verbose: bool,
}

impl SuiteOptions {
    pub fn for_environment(environment: &str) -> Self {
        Self {
            environment: environment.to_string(),
            testdir: None,
            bundle: None,
            deployment: None,
            tests_yaml: None,
            test_pattern: None,
            tests: Vec::new(),
            exclude: Vec::new(),
            log_level: "INFO".to_string(),
            failfast: true,
            skip_implicit: false,
            no_destroy: false,
            verbose: false,
        }
    }
}

/// Result of running the external test suite.
///
/// A non-zero exit is data, not an error: the suite reports test failures
/// through its exit code while still emitting a results document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteOutput {
    pub success: bool,
    pub command: String,
    /// Machine-readable results document emitted on stdout.
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Runs an external test suite against a named environment.
pub trait SuiteRunner: Send + Sync {
    fn run_suite(&self, options: &SuiteOptions) -> Result<SuiteOutput, SuiteError>;
}

/// Invokes the `bundletester` CLI with the JSON reporter.
#[derive(Debug, Clone)]
pub struct CliSuiteRunner {
    pub binary: PathBuf,
}

impl CliSuiteRunner {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("bundletester"),
        }
    }
}

impl Default for CliSuiteRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SuiteRunner for CliSuiteRunner {
    fn run_suite(&self, options: &SuiteOptions) -> Result<SuiteOutput, SuiteError> {
        let args = build_args(options);
        let command = render_command(&self.binary, &args);
        info!(command = %command, "running test suite");

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|source| SuiteError::Io {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8(output.stdout).map_err(|source| SuiteError::NonUtf8Output {
            command: command.clone(),
            stream: "stdout",
            source,
        })?;
        let stderr = String::from_utf8(output.stderr).map_err(|source| SuiteError::NonUtf8Output {
            command: command.clone(),
            stream: "stderr",
            source,
        })?;

        let exit_code = output.status.code();
        debug!(exit_code, "test suite finished");

        Ok(SuiteOutput {
            success: output.status.success(),
            command,
            stdout,
            stderr,
            exit_code,
        })
    }
}

fn build_args(options: &SuiteOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    args.push("-e".into());
    args.push(options.environment.clone().into());
    args.push("-r".into());
    args.push("json".into());
    args.push("-l".into());
    args.push(options.log_level.clone().into());
    if options.failfast {
        args.push("-F".into());
    }
    if options.skip_implicit {
        args.push("--skip-implicit".into());
    }
    if options.no_destroy {
        args.push("--no-destroy".into());
    }
    if options.verbose {
        args.push("-v".into());
    }
    if let Some(testdir) = &options.testdir {
        args.push("-t".into());
        args.push(testdir.clone().into());
    }
    if let Some(bundle) = &options.bundle {
        args.push("-b".into());
        args.push(bundle.clone().into());
    }
    if let Some(deployment) = &options.deployment {
        args.push("-d".into());
        args.push(deployment.clone().into());
    }
    if let Some(tests_yaml) = &options.tests_yaml {
        args.push("-y".into());
        args.push(tests_yaml.clone().into());
    }
    if let Some(pattern) = &options.test_pattern {
        args.push("--test-pattern".into());
        args.push(pattern.clone().into());
    }
    for name in &options.exclude {
        args.push("-x".into());
        args.push(name.clone().into());
    }
    for test in &options.tests {
        args.push(test.clone().into());
    }
    args
}

fn render_command(binary: &Path, args: &[OsString]) -> String {
    let mut rendered = binary.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}
