//! Plan execution against one controller.
//!
//! A [`Runner`] walks each test plan through connect, suite run, benchmark
//! actions, and a merge into the durable report and index. One plan failing
//! never stops the batch; each plan ends in a terminal [`PlanState`] that
//! the summary reports.

use std::path::PathBuf;

use stratus_core::{
    safe_name, Benchmark, PlanState, Report, ReportIndex, SuiteOutputError, SuiteResult, TestPlan,
};
use stratus_env::{resolve_provider_name, Connector, EnvError, Environment};
use stratus_store::{DataStore, StoreError};
use stratus_suite::{SuiteError, SuiteOptions, SuiteRunner};
use tracing::{error, info, warn};

use crate::render;

/// Longest stderr excerpt carried into an error message.
const MAX_REPORTED_STDERR: usize = 2000;

/// Per-controller execution settings resolved from the command line.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub controller: String,
    pub test_id: String,
    pub testdir: Option<PathBuf>,
    pub bundle: Option<String>,
    pub deployment: Option<String>,
    pub tests_yaml: Option<PathBuf>,
    pub test_pattern: Option<String>,
    pub exclude: Vec<String>,
    pub log_level: String,
    pub failfast: bool,
    pub skip_implicit: bool,
    pub no_destroy: bool,
    pub verbose: bool,
    pub dryrun: bool,
    pub results_per_bundle: usize,
}

impl RunnerConfig {
    /// Settings for one controller with every optional knob at its default.
    pub fn new(controller: &str, test_id: &str) -> Self {
        RunnerConfig {
            controller: controller.to_string(),
            test_id: test_id.to_string(),
            testdir: None,
            bundle: None,
            deployment: None,
            tests_yaml: None,
            test_pattern: None,
            exclude: Vec::new(),
            log_level: "INFO".to_string(),
            failfast: true,
            skip_implicit: false,
            no_destroy: false,
            verbose: false,
            dryrun: false,
            results_per_bundle: 40,
        }
    }
}

/// Failure while loading or persisting durable state.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored index exists but cannot be parsed. Starting over from an
    /// empty index would silently discard history, so this is fatal.
    #[error("stored index is not valid JSON: {source}")]
    CorruptIndex {
        #[source]
        source: serde_json::Error,
    },

    #[error("stored report {name} is not valid JSON: {source}")]
    CorruptReport {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to obtain a parseable suite result.
#[derive(Debug, thiserror::Error)]
pub enum TestRunError {
    #[error(transparent)]
    Suite(#[from] SuiteError),

    #[error(transparent)]
    Output(#[from] SuiteOutputError),

    /// The suite failed before emitting any results document, so there is
    /// nothing to record against the report.
    #[error("suite exited with status {exit_code:?} and produced no results: {stderr}")]
    NoOutput {
        exit_code: Option<i32>,
        stderr: String,
    },
}

/// Where one plan's run ended, and why if it fell short.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub bundle_name: String,
    pub requested_provider: String,
    /// Provider name the connected environment reported, once known.
    pub reported_provider: Option<String>,
    pub state: PlanState,
    pub error: Option<String>,
}

impl PlanOutcome {
    pub fn passed(&self) -> bool {
        self.state.is_success()
    }
}

/// Terminal outcomes of every plan in a batch.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<PlanOutcome>,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(PlanOutcome::passed)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| !outcome.passed()).count()
    }
}

/// Executes test plans against a single controller and persists the
/// merged results.
pub struct Runner {
    config: RunnerConfig,
    connector: Box<dyn Connector>,
    suite: Box<dyn SuiteRunner>,
    store: Box<dyn DataStore>,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        connector: Box<dyn Connector>,
        suite: Box<dyn SuiteRunner>,
        store: Box<dyn DataStore>,
    ) -> Self {
        Runner {
            config,
            connector,
            suite,
            store,
        }
    }

    /// Runs every plan in order. A dry run only reports what would
    /// execute; nothing is skipped on failure otherwise.
    pub fn run(&self, plans: &[TestPlan]) -> RunSummary {
        let mut summary = RunSummary::default();
        if self.config.dryrun {
            for plan in plans {
                info!(
                    bundle = %plan.bundle_name,
                    controller = %self.config.controller,
                    tests = ?plan.effective_tests(&self.config.exclude),
                    benchmarks = plan.benchmarks.len(),
                    "dry run, skipping execution"
                );
            }
            return summary;
        }
        for plan in plans {
            let outcome = self.run_plan(plan);
            if outcome.passed() {
                info!(bundle = %outcome.bundle_name, state = %outcome.state, "plan finished");
            } else {
                error!(
                    bundle = %outcome.bundle_name,
                    state = %outcome.state,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "plan failed"
                );
            }
            summary.outcomes.push(outcome);
        }
        summary
    }

    fn run_plan(&self, plan: &TestPlan) -> PlanOutcome {
        let mut outcome = PlanOutcome {
            bundle_name: plan.bundle_name.clone(),
            requested_provider: self.config.controller.clone(),
            reported_provider: None,
            state: PlanState::Connecting,
            error: None,
        };

        let env = match self.connector.connect(&self.config.controller) {
            Ok(env) => env,
            Err(err) => {
                outcome.state = PlanState::ConnectFailed;
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };
        let provider = resolve_provider_name(env.as_ref());
        outcome.reported_provider = Some(provider.clone());
        info!(
            bundle = %plan.bundle_name,
            controller = %self.config.controller,
            provider = %provider,
            "environment connected"
        );

        outcome.state = PlanState::Testing;
        let suite = match self.run_tests(env.as_ref(), plan) {
            Ok(suite) => suite,
            Err(err) => {
                outcome.state = PlanState::TestFailed;
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };

        outcome.state = PlanState::Benchmarking;
        let benchmarks = match self.run_benchmarks(plan, env.as_ref(), &provider) {
            Ok(benchmarks) => benchmarks,
            Err(err) => {
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };

        outcome.state = PlanState::Merging;
        if let Err(err) = self.merge_and_persist(plan, &provider, suite, benchmarks) {
            outcome.error = Some(err.to_string());
            return outcome;
        }

        outcome.state = PlanState::Persisted;
        outcome
    }

    /// Runs the external suite for a plan and parses its results.
    fn run_tests(
        &self,
        env: &dyn Environment,
        plan: &TestPlan,
    ) -> Result<SuiteResult, TestRunError> {
        let mut options = SuiteOptions::for_environment(&env.name());
        options.testdir = self.config.testdir.clone();
        options.bundle = self
            .config
            .bundle
            .clone()
            .or_else(|| plan.bundle_file.clone());
        options.deployment = self.config.deployment.clone();
        options.tests_yaml = self.config.tests_yaml.clone();
        options.test_pattern = self.config.test_pattern.clone();
        options.tests = plan.effective_tests(&self.config.exclude);
        options.exclude = merged_exclusions(&plan.exclude, &self.config.exclude);
        options.log_level = self.config.log_level.clone();
        options.failfast = self.config.failfast;
        options.skip_implicit = self.config.skip_implicit;
        options.no_destroy = self.config.no_destroy;
        options.verbose = self.config.verbose;

        let output = self.suite.run_suite(&options)?;
        if !output.success && output.stdout.trim().is_empty() {
            return Err(TestRunError::NoOutput {
                exit_code: output.exit_code,
                stderr: truncate_output(&output.stderr, MAX_REPORTED_STDERR),
            });
        }
        Ok(SuiteResult::from_suite_output(&output.stdout)?)
    }

    /// Runs every benchmark action declared by the plan.
    ///
    /// A unit that cannot be found is a plan configuration error and fails
    /// the whole plan. A single action failing, or publishing an unusable
    /// result, only loses that measurement.
    fn run_benchmarks(
        &self,
        plan: &TestPlan,
        env: &dyn Environment,
        provider: &str,
    ) -> Result<Vec<Benchmark>, EnvError> {
        let mut benchmarks = Vec::new();
        for bench in &plan.benchmarks {
            let unit = env.find_unit(&bench.unit)?;
            for invocation in &bench.invocations {
                let action = match env.run_action(&unit, &invocation.name, &invocation.params) {
                    Ok(action) => action,
                    Err(err) => {
                        error!(
                            unit = %unit,
                            action = %invocation.name,
                            error = %err,
                            "benchmark action failed"
                        );
                        continue;
                    }
                };
                match Benchmark::from_action(
                    &invocation.name,
                    provider,
                    &self.config.test_id,
                    &action.results,
                ) {
                    Ok(benchmark) => benchmarks.push(benchmark),
                    Err(err) => {
                        error!(
                            unit = %unit,
                            action = %invocation.name,
                            error = %err,
                            "benchmark result unusable"
                        );
                    }
                }
            }
        }
        Ok(benchmarks)
    }

    /// Loads the stored index, starting empty when none exists yet.
    fn load_index(&self) -> Result<ReportIndex, RunError> {
        match self.store.read(ReportIndex::FULL_INDEX_JSON) {
            Ok(raw) => {
                ReportIndex::from_json(&raw).map_err(|source| RunError::CorruptIndex { source })
            }
            Err(StoreError::NotFound { .. }) => Ok(ReportIndex::default()),
            Err(err) => Err(RunError::Store(err)),
        }
    }

    /// Loads this run's report for the plan, or starts a fresh one, and
    /// folds in benchmark history from the previous run.
    fn load_report(
        &self,
        index: &ReportIndex,
        plan: &TestPlan,
        provider: &str,
    ) -> Result<Report, RunError> {
        let name = plan.report_filename(&self.config.test_id);
        let mut report = match self.store.read(&name) {
            Ok(raw) => Report::from_json(&raw)
                .map_err(|source| RunError::CorruptReport { name, source })?,
            Err(StoreError::NotFound { .. }) => {
                Report::new(&self.config.test_id, &plan.bundle_name, plan.url.clone())
            }
            Err(err) => return Err(RunError::Store(err)),
        };
        self.hydrate_benchmark_history(index, &mut report, provider);
        Ok(report)
    }

    /// Carries the previous run's benchmarks into the report so per-bundle
    /// pages keep showing older measurements. Current values win over
    /// hydrated ones. History that cannot be read is dropped, not fatal.
    fn hydrate_benchmark_history(&self, index: &ReportIndex, report: &mut Report, provider: &str) {
        let Some(entry) = index.find_previous_report(
            &report.bundle_name,
            provider,
            Some(self.config.test_id.as_str()),
        ) else {
            return;
        };
        let name = entry.report_json_filename();
        let raw = match self.store.read(&name) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(report = %name, error = %err, "previous report unreadable, skipping benchmark history");
                return;
            }
        };
        let previous = match Report::from_json(&raw) {
            Ok(previous) => previous,
            Err(err) => {
                warn!(report = %name, error = %err, "previous report unparseable, skipping benchmark history");
                return;
            }
        };
        let current = std::mem::take(&mut report.benchmarks);
        report.upsert_benchmarks(previous.benchmarks);
        report.upsert_benchmarks(current);
    }

    /// Merges this run into the report and index, writes both documents,
    /// and re-renders every derived view.
    fn merge_and_persist(
        &self,
        plan: &TestPlan,
        provider: &str,
        suite: SuiteResult,
        benchmarks: Vec<Benchmark>,
    ) -> Result<(), RunError> {
        let mut index = self.load_index()?;
        let mut report = self.load_report(&index, plan, provider)?;
        report.upsert_result(provider, &self.config.controller, suite);
        report.upsert_benchmarks(benchmarks);
        index.upsert_report(&report);

        let report_json = report.to_json().map_err(|source| RunError::Serialize {
            what: "report",
            source,
        })?;
        self.store
            .write(&plan.report_filename(&self.config.test_id), &report_json)?;
        let index_json = index.to_json().map_err(|source| RunError::Serialize {
            what: "index",
            source,
        })?;
        self.store.write(ReportIndex::FULL_INDEX_JSON, &index_json)?;
        self.render_views(&index, &report)?;
        info!(
            bundle = %report.bundle_name,
            provider = %provider,
            test_id = %self.config.test_id,
            "results persisted"
        );
        Ok(())
    }

    /// Writes the report page plus every index-derived view.
    fn render_views(&self, index: &ReportIndex, report: &Report) -> Result<(), RunError> {
        let report_html = format!(
            "{}/{}.html",
            report.test_id,
            safe_name(&report.bundle_name)
        );
        self.store.write(&report_html, &render::report_page(report))?;
        self.render_index_views(index)?;
        for bundle in index.bundle_names() {
            let page = render::bundle_page(index, &bundle, self.config.results_per_bundle);
            self.store.write(&index.bundle_index_filename(&bundle), &page)?;
        }
        Ok(())
    }

    /// Writes the front page and both summary documents.
    fn render_index_views(&self, index: &ReportIndex) -> Result<(), RunError> {
        self.store
            .write(ReportIndex::FULL_INDEX_HTML, &render::index_page(index))?;
        let summary = render::summary_json(index).map_err(|source| RunError::Serialize {
            what: "summary",
            source,
        })?;
        self.store.write(ReportIndex::SUMMARY_JSON, &summary)?;
        self.store
            .write(ReportIndex::SUMMARY_HTML, &render::summary_page(index))?;
        Ok(())
    }

    /// Drops every index entry for a bundle and rewrites the index views.
    /// Per-bundle pages and report documents are left in place.
    pub fn remove_test(&self, bundle_name: &str) -> Result<usize, RunError> {
        let mut index = self.load_index()?;
        let removed = index.remove_test_by_bundle_name(bundle_name);
        let index_json = index.to_json().map_err(|source| RunError::Serialize {
            what: "index",
            source,
        })?;
        self.store.write(ReportIndex::FULL_INDEX_JSON, &index_json)?;
        self.render_index_views(&index)?;
        info!(bundle = %bundle_name, removed, "removed index entries");
        Ok(removed)
    }
}

/// Plan-level exclusions first, then caller-supplied ones, no duplicates.
fn merged_exclusions(plan_exclude: &[String], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = plan_exclude.to_vec();
    for name in extra {
        if !merged.iter().any(|known| known == name) {
            merged.push(name.clone());
        }
    }
    merged
}

fn truncate_output(raw: &str, max_bytes: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.len() <= max_bytes {
        return trimmed.to_string();
    }
    let mut end = max_bytes;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &trimmed[..end], trimmed.len())
}
