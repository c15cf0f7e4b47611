//! Command-line interface for the stratus binary.

use std::path::PathBuf;

use chrono::Utc;
use clap::{ArgAction, Parser};

/// Run declarative test plans against one or more controllers and
/// publish the aggregated results.
#[derive(Debug, Clone, Parser)]
#[command(name = "stratus", version)]
pub struct Args {
    /// Path to the YAML test plan document.
    pub test_plan: PathBuf,

    /// Controllers to run every plan against, in order.
    #[arg(required = true, num_args = 1..)]
    pub controllers: Vec<String>,

    /// Identifier for this run. Defaults to a UTC timestamp.
    #[arg(long)]
    pub test_id: Option<String>,

    /// Directory for results when no bucket is configured.
    #[arg(long, default_value = "results")]
    pub results_dir: String,

    /// S3 bucket to publish results to instead of the local directory.
    #[arg(long)]
    pub bucket: Option<String>,

    /// Credentials file handed to the aws CLI.
    #[arg(long, value_name = "FILE")]
    pub s3_creds: Option<PathBuf>,

    /// Whether uploaded objects are marked publicly readable.
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub s3_public: bool,

    /// Remove every index entry for the named bundle and exit.
    #[arg(long, value_name = "BUNDLE_NAME")]
    pub remove_test: Option<String>,

    /// Stop the suite at the first failing test.
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub failfast: bool,

    /// Skip implicit suite checks such as charm proof.
    #[arg(long)]
    pub skip_implicit: bool,

    /// Leave deployed workloads running after the suite finishes.
    #[arg(long)]
    pub no_destroy: bool,

    /// Report what would run without contacting any controller.
    #[arg(long)]
    pub dryrun: bool,

    /// Most recent results kept on each per-bundle page.
    #[arg(long, default_value_t = 40)]
    pub results_per_bundle: usize,

    /// Major version of the juju CLI in use.
    #[arg(long, default_value_t = 2)]
    pub juju_major_version: u32,

    /// Log level handed to the test suite.
    #[arg(long, default_value = "INFO")]
    pub log_level: String,

    /// Test names to exclude on top of each plan's own exclusions.
    #[arg(long, short = 'x')]
    pub exclude: Vec<String>,

    /// Bundle file within the deployment to test.
    #[arg(long)]
    pub bundle: Option<String>,

    /// Deployment within the bundle file to test.
    #[arg(long)]
    pub deployment: Option<String>,

    /// Explicit tests.yaml handed to the suite.
    #[arg(long, value_name = "FILE")]
    pub tests_yaml: Option<PathBuf>,

    /// Pattern the suite uses to discover test files.
    #[arg(long)]
    pub test_pattern: Option<String>,

    /// Directory of tests run instead of the deployed charm's own.
    #[arg(long, value_name = "DIR")]
    pub testdir: Option<PathBuf>,

    /// Verbose suite and runner output.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Args {
    /// Identifier for this run, minting a timestamp when none was given.
    pub fn effective_test_id(&self) -> String {
        self.test_id.clone().unwrap_or_else(default_test_id)
    }

    /// Store location string, preferring the bucket over the local directory.
    pub fn store_location(&self) -> String {
        match &self.bucket {
            Some(bucket) if bucket.starts_with("s3://") => bucket.clone(),
            Some(bucket) => format!("s3://{bucket}"),
            None => self.results_dir.clone(),
        }
    }
}

/// UTC timestamp identifier in `%Y%m%d%H%M%S` form.
pub fn default_test_id() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("arguments must parse")
    }

    #[test]
    fn defaults_match_documented_values() {
        let args = parse(&["stratus", "plan.yaml", "aws"]);

        assert_eq!(args.test_plan, PathBuf::from("plan.yaml"));
        assert_eq!(args.controllers, vec!["aws".to_string()]);
        assert_eq!(args.test_id, None);
        assert_eq!(args.results_dir, "results");
        assert_eq!(args.bucket, None);
        assert!(args.s3_public);
        assert!(args.failfast);
        assert!(!args.skip_implicit);
        assert!(!args.no_destroy);
        assert!(!args.dryrun);
        assert_eq!(args.results_per_bundle, 40);
        assert_eq!(args.juju_major_version, 2);
        assert_eq!(args.log_level, "INFO");
        assert!(args.exclude.is_empty());
        assert!(!args.verbose);
    }

    #[test]
    fn accepts_multiple_controllers_in_order() {
        let args = parse(&["stratus", "plan.yaml", "aws", "gce", "azure"]);

        assert_eq!(
            args.controllers,
            vec!["aws".to_string(), "gce".to_string(), "azure".to_string()]
        );
    }

    #[test]
    fn requires_at_least_one_controller() {
        let parsed = Args::try_parse_from(["stratus", "plan.yaml"]);

        assert!(parsed.is_err());
    }

    #[test]
    fn boolean_flags_accept_explicit_values() {
        let args = parse(&[
            "stratus",
            "plan.yaml",
            "aws",
            "--s3-public",
            "false",
            "--failfast",
            "false",
        ]);

        assert!(!args.s3_public);
        assert!(!args.failfast);
    }

    #[test]
    fn exclude_flag_repeats() {
        let args = parse(&["stratus", "plan.yaml", "aws", "-x", "10-deploy", "-x", "20-scale"]);

        assert_eq!(args.exclude, vec!["10-deploy".to_string(), "20-scale".to_string()]);
    }

    #[test]
    fn store_location_prefers_bucket() {
        let args = parse(&["stratus", "plan.yaml", "aws", "--bucket", "cwr-results"]);

        assert_eq!(args.store_location(), "s3://cwr-results");
    }

    #[test]
    fn store_location_keeps_existing_scheme() {
        let args = parse(&["stratus", "plan.yaml", "aws", "--bucket", "s3://cwr-results"]);

        assert_eq!(args.store_location(), "s3://cwr-results");
    }

    #[test]
    fn store_location_falls_back_to_results_dir() {
        let args = parse(&["stratus", "plan.yaml", "aws", "--results-dir", "out"]);

        assert_eq!(args.store_location(), "out");
    }

    #[test]
    fn effective_test_id_prefers_explicit_value() {
        let args = parse(&["stratus", "plan.yaml", "aws", "--test-id", "20260515120000"]);

        assert_eq!(args.effective_test_id(), "20260515120000");
    }

    #[test]
    fn default_test_id_is_a_compact_timestamp() {
        let id = default_test_id();

        assert_eq!(id.len(), 14);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }
}
