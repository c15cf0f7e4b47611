//! Reports: the per-(bundle, test id) aggregate of suite results and
//! benchmark records, merged across providers and re-runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum SuiteOutputError {
    #[error("failed to parse suite output: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
    },
    #[error("suite output must be a sequence of test entries")]
    UnexpectedShape,
    #[error("suite output entry {entry} has no test name")]
    MissingTestName { entry: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum BenchmarkParseError {
    #[error("action result for benchmark {name} has no meta.composite block")]
    MissingComposite { name: String },
    #[error("action result for benchmark {name} has no composite value")]
    MissingValue { name: String },
}

/// Outcome of one test script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestOutcome {
    Pass,
    Fail,
    Skip,
}

/// Rolled-up outcome of one suite run, and the per-provider status shown
/// in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuiteStatus {
    Pass,
    Fail,
    None,
}

impl SuiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteStatus::Pass => "PASS",
            SuiteStatus::Fail => "FAIL",
            SuiteStatus::None => "NONE",
        }
    }
}

impl std::fmt::Display for SuiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One test script's result within a suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub outcome: TestOutcome,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub output: Option<String>,
}

/// Result of one full suite execution, before it is bucketed by provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    pub status: SuiteStatus,
    pub tests: Vec<TestResult>,
    #[serde(with = "crate::time::iso")]
    pub date: DateTime<Utc>,
}

impl SuiteResult {
    /// Parses the external runner's YAML output. Accepts either a bare
    /// sequence of test entries or a mapping with a `tests` sequence.
    pub fn from_suite_output(raw: &str) -> Result<SuiteResult, SuiteOutputError> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|source| SuiteOutputError::Parse { source })?;
        let entries: Vec<serde_yaml::Value> = match doc {
            serde_yaml::Value::Null => Vec::new(),
            serde_yaml::Value::Sequence(entries) => entries,
            serde_yaml::Value::Mapping(mapping) => match mapping.get("tests") {
                Some(serde_yaml::Value::Sequence(entries)) => entries.clone(),
                _ => return Err(SuiteOutputError::UnexpectedShape),
            },
            _ => return Err(SuiteOutputError::UnexpectedShape),
        };

        let mut tests = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            tests.push(parse_test_entry(entry, position)?);
        }
        Ok(SuiteResult {
            status: derive_status(&tests),
            tests,
            date: Utc::now(),
        })
    }
}

fn parse_test_entry(
    entry: &serde_yaml::Value,
    position: usize,
) -> Result<TestResult, SuiteOutputError> {
    let mapping = entry
        .as_mapping()
        .ok_or(SuiteOutputError::UnexpectedShape)?;
    let name = mapping
        .get("test")
        .and_then(serde_yaml::Value::as_str)
        .ok_or(SuiteOutputError::MissingTestName { entry: position })?
        .to_string();
    let outcome = match mapping.get("returncode") {
        None | Some(serde_yaml::Value::Null) => TestOutcome::Skip,
        Some(code) => match code.as_i64() {
            Some(0) => TestOutcome::Pass,
            _ => TestOutcome::Fail,
        },
    };
    let duration_secs = mapping
        .get("duration")
        .and_then(serde_yaml::Value::as_f64)
        .unwrap_or(0.0);
    let output = mapping
        .get("output")
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string);
    Ok(TestResult {
        name,
        outcome,
        duration_secs,
        output,
    })
}

/// FAIL dominates, then PASS; a suite with nothing run is NONE.
fn derive_status(tests: &[TestResult]) -> SuiteStatus {
    if tests.iter().any(|test| test.outcome == TestOutcome::Fail) {
        SuiteStatus::Fail
    } else if tests.iter().any(|test| test.outcome == TestOutcome::Pass) {
        SuiteStatus::Pass
    } else {
        SuiteStatus::None
    }
}

/// One benchmark action's measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub name: String,
    pub provider: String,
    pub test_id: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default = "crate::time::default_now", with = "crate::time::iso")]
    pub date: DateTime<Utc>,
}

impl Benchmark {
    /// Builds a benchmark record from a raw action result, reading the
    /// `meta.composite` block.
    pub fn from_action(
        name: &str,
        provider: &str,
        test_id: &str,
        results: &serde_json::Value,
    ) -> Result<Benchmark, BenchmarkParseError> {
        let composite = results
            .get("meta")
            .and_then(|meta| meta.get("composite"))
            .ok_or_else(|| BenchmarkParseError::MissingComposite {
                name: name.to_string(),
            })?;
        let value = match composite.get("value") {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                return Err(BenchmarkParseError::MissingValue {
                    name: name.to_string(),
                })
            }
        };
        let units = composite
            .get("units")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let direction = composite
            .get("direction")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        Ok(Benchmark {
            name: name.to_string(),
            provider: provider.to_string(),
            test_id: test_id.to_string(),
            value,
            units,
            direction,
            date: Utc::now(),
        })
    }
}

/// One provider's slot in a report. The map key is the provider name the
/// connected environment reported; the name the run was asked for is kept
/// alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    #[serde(default)]
    pub requested_provider: String,
    pub status: SuiteStatus,
    #[serde(default)]
    pub tests: Vec<TestResult>,
    #[serde(default = "crate::time::default_now", with = "crate::time::iso")]
    pub date: DateTime<Utc>,
}

impl ProviderResult {
    pub fn from_suite(requested_provider: &str, suite: SuiteResult) -> Self {
        ProviderResult {
            requested_provider: requested_provider.to_string(),
            status: suite.status,
            tests: suite.tests,
            date: suite.date,
        }
    }
}

/// The durable aggregate for one (bundle, test id): per-provider suite
/// results plus the benchmark series.
///
/// Partial documents hydrate with defaults so reports written by earlier
/// tool versions still load; only `test_id` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub test_id: String,
    #[serde(default)]
    pub bundle_name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub test_label: Option<String>,
    #[serde(default = "crate::time::default_now", with = "crate::time::iso")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub results: BTreeMap<String, ProviderResult>,
    #[serde(default)]
    pub benchmarks: Vec<Benchmark>,
}

impl Report {
    pub fn new(test_id: &str, bundle_name: &str, url: Option<String>) -> Self {
        Report {
            test_id: test_id.to_string(),
            bundle_name: bundle_name.to_string(),
            url,
            test_label: None,
            date: Utc::now(),
            results: BTreeMap::new(),
            benchmarks: Vec::new(),
        }
    }

    /// Stores one suite run under the reported provider name, replacing any
    /// prior entry for that provider and leaving other providers untouched.
    pub fn upsert_result(
        &mut self,
        reported_provider: &str,
        requested_provider: &str,
        suite: SuiteResult,
    ) {
        self.date = suite.date;
        self.results.insert(
            reported_provider.to_string(),
            ProviderResult::from_suite(requested_provider, suite),
        );
    }

    /// Merges benchmark records: an incoming benchmark replaces a prior one
    /// with the same name in place, new names append in order.
    pub fn upsert_benchmarks(&mut self, incoming: Vec<Benchmark>) {
        for benchmark in incoming {
            match self
                .benchmarks
                .iter_mut()
                .find(|existing| existing.name == benchmark.name)
            {
                Some(existing) => *existing = benchmark,
                None => self.benchmarks.push(benchmark),
            }
        }
    }

    /// Index statuses, keyed by reported provider.
    pub fn provider_statuses(&self) -> BTreeMap<String, SuiteStatus> {
        self.results
            .iter()
            .map(|(provider, result)| (provider.clone(), result.status))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> Result<Report, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
