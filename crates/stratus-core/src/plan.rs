//! Test plan loading.
//!
//! A plan document is YAML: either a single plan mapping or a sequence of
//! them. Benchmark specs are normalized at parse time so the rest of the
//! pipeline only sees `unit -> [invocation]` lists in declaration order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::index::safe_name;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("failed to read test plan at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse test plan document: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
    },
    #[error("test plan document must be a mapping or a sequence of mappings")]
    UnexpectedShape,
    #[error("test plan {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("test plan {index} field `{field}` is invalid: {reason}")]
    InvalidField {
        index: usize,
        field: &'static str,
        reason: String,
    },
    #[error("benchmark spec for unit {unit} is invalid: {reason}")]
    InvalidBenchmark { unit: String, reason: String },
}

/// One named benchmark action with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkInvocation {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// All benchmark invocations declared against one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkPlan {
    pub unit: String,
    pub invocations: Vec<BenchmarkInvocation>,
}

/// A declarative test plan, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    pub bundle: String,
    pub bundle_name: String,
    pub bundle_file: Option<String>,
    pub tests: Vec<String>,
    pub benchmarks: Vec<BenchmarkPlan>,
    pub exclude: Vec<String>,
    pub url: Option<String>,
}

impl TestPlan {
    /// Parses every plan in a YAML document. All-or-nothing: one malformed
    /// plan fails the whole load.
    pub fn load_plans(source: &str) -> Result<Vec<TestPlan>, PlanError> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(source).map_err(|source| PlanError::Parse { source })?;
        match doc {
            serde_yaml::Value::Null => Ok(Vec::new()),
            serde_yaml::Value::Sequence(entries) => entries
                .iter()
                .enumerate()
                .map(|(index, entry)| Self::from_value_at(entry, index))
                .collect(),
            mapping @ serde_yaml::Value::Mapping(_) => {
                Ok(vec![Self::from_value_at(&mapping, 0)?])
            }
            _ => Err(PlanError::UnexpectedShape),
        }
    }

    /// Reads and parses a plan document from disk.
    pub fn load_plans_from_path(path: impl AsRef<Path>) -> Result<Vec<TestPlan>, PlanError> {
        let path_ref = path.as_ref();
        let body = fs::read_to_string(path_ref).map_err(|source| PlanError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;
        Self::load_plans(&body)
    }

    /// Builds a single plan from one parsed YAML mapping.
    pub fn from_value(value: &serde_yaml::Value) -> Result<TestPlan, PlanError> {
        Self::from_value_at(value, 0)
    }

    fn from_value_at(value: &serde_yaml::Value, index: usize) -> Result<TestPlan, PlanError> {
        let mapping = value.as_mapping().ok_or(PlanError::UnexpectedShape)?;

        let bundle = string_field(mapping, "bundle", index)?
            .ok_or(PlanError::MissingField { index, field: "bundle" })?;
        let bundle_name = match string_field(mapping, "bundle_name", index)? {
            Some(name) => name,
            None => default_bundle_name(&bundle),
        };
        let bundle_file = string_field(mapping, "bundle_file", index)?;
        let url = string_field(mapping, "url", index)?;
        let tests = string_list_field(mapping, "tests", index)?;
        let exclude = string_list_field(mapping, "exclude", index)?;
        let benchmarks = match mapping.get("benchmark") {
            Some(serde_yaml::Value::Mapping(spec)) => normalize_benchmarks(spec)?,
            Some(serde_yaml::Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(PlanError::InvalidField {
                    index,
                    field: "benchmark",
                    reason: "expected a mapping of unit to benchmark spec".to_string(),
                })
            }
        };

        Ok(TestPlan {
            bundle,
            bundle_name,
            bundle_file,
            tests,
            benchmarks,
            exclude,
            url,
        })
    }

    /// Storage key for this plan's report under a given test id.
    pub fn report_filename(&self, test_id: &str) -> String {
        format!("{}/{}.json", test_id, safe_name(&self.bundle_name))
    }

    /// Declared tests minus plan-level and caller-supplied exclusions,
    /// in declaration order.
    pub fn effective_tests(&self, extra_exclude: &[String]) -> Vec<String> {
        self.tests
            .iter()
            .filter(|test| {
                !self.exclude.iter().any(|ex| ex == *test)
                    && !extra_exclude.iter().any(|ex| ex == *test)
            })
            .cloned()
            .collect()
    }
}

/// Last path segment of the bundle reference, scheme prefix stripped.
fn default_bundle_name(bundle: &str) -> String {
    let without_scheme = match bundle.split_once(':') {
        Some((_, rest)) => rest,
        None => bundle,
    };
    without_scheme
        .rsplit('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

fn string_field(
    mapping: &serde_yaml::Mapping,
    field: &'static str,
    index: usize,
) -> Result<Option<String>, PlanError> {
    match mapping.get(field) {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(PlanError::InvalidField {
            index,
            field,
            reason: "expected a string".to_string(),
        }),
    }
}

fn string_list_field(
    mapping: &serde_yaml::Mapping,
    field: &'static str,
    index: usize,
) -> Result<Vec<String>, PlanError> {
    match mapping.get(field) {
        None | Some(serde_yaml::Value::Null) => Ok(Vec::new()),
        Some(serde_yaml::Value::Sequence(entries)) => entries
            .iter()
            .map(|entry| match entry {
                serde_yaml::Value::String(value) => Ok(value.clone()),
                _ => Err(PlanError::InvalidField {
                    index,
                    field,
                    reason: "expected a list of strings".to_string(),
                }),
            })
            .collect(),
        Some(_) => Err(PlanError::InvalidField {
            index,
            field,
            reason: "expected a list of strings".to_string(),
        }),
    }
}

/// Normalizes the `benchmark` mapping. A bare string names a single
/// parameterless invocation; a mapping declares one invocation per key.
/// Declaration order is preserved at both levels.
fn normalize_benchmarks(spec: &serde_yaml::Mapping) -> Result<Vec<BenchmarkPlan>, PlanError> {
    let mut plans = Vec::with_capacity(spec.len());
    for (unit_key, value) in spec {
        let unit = unit_key
            .as_str()
            .ok_or_else(|| PlanError::InvalidBenchmark {
                unit: format!("{unit_key:?}"),
                reason: "unit key must be a string".to_string(),
            })?
            .to_string();
        let invocations = match value {
            serde_yaml::Value::String(name) => vec![BenchmarkInvocation {
                name: name.clone(),
                params: BTreeMap::new(),
            }],
            serde_yaml::Value::Mapping(named) => normalize_named_invocations(&unit, named)?,
            _ => {
                return Err(PlanError::InvalidBenchmark {
                    unit,
                    reason: "expected a benchmark name or a mapping of names to params"
                        .to_string(),
                })
            }
        };
        plans.push(BenchmarkPlan { unit, invocations });
    }
    Ok(plans)
}

fn normalize_named_invocations(
    unit: &str,
    named: &serde_yaml::Mapping,
) -> Result<Vec<BenchmarkInvocation>, PlanError> {
    let mut invocations = Vec::with_capacity(named.len());
    for (name_key, params_value) in named {
        let name = name_key
            .as_str()
            .ok_or_else(|| PlanError::InvalidBenchmark {
                unit: unit.to_string(),
                reason: "benchmark name must be a string".to_string(),
            })?
            .to_string();
        let params = match params_value {
            serde_yaml::Value::Null => BTreeMap::new(),
            serde_yaml::Value::Mapping(raw_params) => scalar_params(unit, raw_params)?,
            _ => {
                return Err(PlanError::InvalidBenchmark {
                    unit: unit.to_string(),
                    reason: format!("params for `{name}` must be a mapping"),
                })
            }
        };
        invocations.push(BenchmarkInvocation { name, params });
    }
    Ok(invocations)
}

fn scalar_params(
    unit: &str,
    raw: &serde_yaml::Mapping,
) -> Result<BTreeMap<String, String>, PlanError> {
    let mut params = BTreeMap::new();
    for (key, value) in raw {
        let key = key
            .as_str()
            .ok_or_else(|| PlanError::InvalidBenchmark {
                unit: unit.to_string(),
                reason: "param name must be a string".to_string(),
            })?
            .to_string();
        let rendered = match value {
            serde_yaml::Value::String(text) => text.clone(),
            serde_yaml::Value::Number(number) => number.to_string(),
            serde_yaml::Value::Bool(flag) => flag.to_string(),
            _ => {
                return Err(PlanError::InvalidBenchmark {
                    unit: unit.to_string(),
                    reason: format!("param `{key}` must be a scalar"),
                })
            }
        };
        params.insert(key, rendered);
    }
    Ok(params)
}
