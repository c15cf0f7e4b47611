use clap::Parser;
use tracing_subscriber::EnvFilter;

use stratus_core::{PlanError, TestPlan};
use stratus_env::CliConnector;
use stratus_runner::{Args, RunError, Runner, RunnerConfig};
use stratus_store::StoreError;
use stratus_suite::CliSuiteRunner;

fn main() {
    if let Err(err) = run() {
        eprintln!("stratus failed: {err}");
        std::process::exit(1);
    }
}

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("{failed} of {total} plan runs failed")]
    PlansFailed { failed: usize, total: usize },
}

fn run() -> Result<(), MainError> {
    let args = Args::parse();
    init_tracing(&args);

    let test_id = args.effective_test_id();
    let location = args.store_location();

    if let Some(bundle_name) = &args.remove_test {
        let controller = args.controllers.first().map(String::as_str).unwrap_or("local");
        let runner = build_runner(&args, controller, &test_id, &location)?;
        let removed = runner.remove_test(bundle_name)?;
        println!("removed {removed} result(s) for {bundle_name}");
        return Ok(());
    }

    let plans = TestPlan::load_plans_from_path(&args.test_plan)?;
    let mut failed = 0;
    let mut total = 0;
    for controller in &args.controllers {
        let runner = build_runner(&args, controller, &test_id, &location)?;
        let summary = runner.run(&plans);
        failed += summary.failed_count();
        total += summary.outcomes.len();
    }
    if failed > 0 {
        return Err(MainError::PlansFailed { failed, total });
    }
    Ok(())
}

fn build_runner(
    args: &Args,
    controller: &str,
    test_id: &str,
    location: &str,
) -> Result<Runner, MainError> {
    let mut config = RunnerConfig::new(controller, test_id);
    config.testdir = args.testdir.clone();
    config.bundle = args.bundle.clone();
    config.deployment = args.deployment.clone();
    config.tests_yaml = args.tests_yaml.clone();
    config.test_pattern = args.test_pattern.clone();
    config.exclude = args.exclude.clone();
    config.log_level = args.log_level.clone();
    config.failfast = args.failfast;
    config.skip_implicit = args.skip_implicit;
    config.no_destroy = args.no_destroy;
    config.verbose = args.verbose;
    config.dryrun = args.dryrun;
    config.results_per_bundle = args.results_per_bundle;

    let connector = CliConnector::new(args.juju_major_version);
    let suite = CliSuiteRunner::new();
    let store = stratus_store::get(location, args.s3_creds.as_deref(), args.s3_public)?;
    Ok(Runner::new(
        config,
        Box::new(connector),
        Box::new(suite),
        store,
    ))
}

fn init_tracing(args: &Args) {
    let level = if args.verbose {
        "debug".to_string()
    } else {
        args.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
