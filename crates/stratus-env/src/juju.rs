use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::env::{ActionResult, Connector, EnvInfo, Environment};
use crate::error::EnvError;
use crate::retry::{run_with_retry, RetryConfig};

/// Captured output of a finished `juju` invocation.
#[derive(Debug, Clone)]
pub struct JujuOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Thin wrapper over the `juju` binary.
#[derive(Debug, Clone)]
pub struct JujuCli {
    pub binary: PathBuf,
}

impl JujuCli {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("juju"),
        }
    }

    /// Runs `juju` with the given arguments and captures its output.
    pub fn run<I, S>(&self, args: I) -> Result<JujuOutput, EnvError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|arg| arg.as_ref().to_owned()).collect();
        let rendered = render_command(&self.binary, &args);
        debug!(command = %rendered, "running environment command");

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|source| EnvError::Io {
                command: rendered.clone(),
                source,
            })?;

        let stdout = String::from_utf8(output.stdout).map_err(|source| EnvError::NonUtf8Output {
            command: rendered.clone(),
            source,
        })?;
        let stderr = match String::from_utf8(output.stderr) {
            Ok(text) => text,
            Err(raw) => String::from_utf8_lossy(raw.as_bytes()).into_owned(),
        };

        if !output.status.success() {
            return Err(EnvError::CommandFailed {
                command: rendered,
                status: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(JujuOutput { stdout, stderr })
    }
}

impl Default for JujuCli {
    fn default() -> Self {
        Self::new()
    }
}

fn render_command(binary: &Path, args: &[OsString]) -> String {
    let mut rendered = binary.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

/// Connects to controllers through the `juju` CLI, retrying transient
/// failures with exponential backoff.
#[derive(Debug, Clone)]
pub struct CliConnector {
    pub cli: JujuCli,
    pub major_version: u32,
    pub retry: RetryConfig,
}

impl CliConnector {
    pub fn new(major_version: u32) -> Self {
        Self::with_retry(major_version, RetryConfig::default())
    }

    pub fn with_retry(major_version: u32, retry: RetryConfig) -> Self {
        Self {
            cli: JujuCli::new(),
            major_version,
            retry,
        }
    }

    fn fetch_info(&self, controller: &str) -> Result<EnvInfo, EnvError> {
        let output = if self.major_version >= 2 {
            self.cli
                .run(["show-model", "-m", controller, "--format", "json"])?
        } else {
            self.cli
                .run(["get-env", "-e", controller, "--format", "json"])?
        };
        parse_model_info(&output.stdout)
    }
}

impl Connector for CliConnector {
    fn connect(&self, controller: &str) -> Result<Box<dyn Environment>, EnvError> {
        let info = run_with_retry("controller connect", &self.retry, || {
            self.fetch_info(controller)
        })
        .map_err(|err| EnvError::Connect {
            controller: controller.to_string(),
            reason: err.to_string(),
        })?;
        info!(controller, provider_type = %info.provider_type, "connected to environment");
        Ok(Box::new(CliEnvironment {
            cli: self.cli.clone(),
            model: controller.to_string(),
            major_version: self.major_version,
            info,
        }))
    }
}

/// An environment reached through the `juju` CLI.
pub struct CliEnvironment {
    cli: JujuCli,
    model: String,
    major_version: u32,
    info: EnvInfo,
}

impl CliEnvironment {
    fn model_flag(&self) -> &'static str {
        if self.major_version >= 2 {
            "-m"
        } else {
            "-e"
        }
    }

    fn run_action_v2(
        &self,
        unit: &str,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<ActionResult, EnvError> {
        let mut args = vec![
            "run-action".to_string(),
            self.model_flag().to_string(),
            self.model.clone(),
            unit.to_string(),
            action.to_string(),
        ];
        args.extend(render_params(params));
        args.push("--wait".to_string());
        args.push("--format".to_string());
        args.push("json".to_string());
        let output = self.cli.run(&args)?;
        parse_action_result(&output.stdout)
    }

    fn run_action_v1(
        &self,
        unit: &str,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<ActionResult, EnvError> {
        let mut args = vec![
            "action".to_string(),
            "do".to_string(),
            self.model_flag().to_string(),
            self.model.clone(),
            unit.to_string(),
            action.to_string(),
        ];
        args.extend(render_params(params));
        args.push("--format".to_string());
        args.push("json".to_string());
        let queued = self.cli.run(&args)?;
        let id = parse_queued_action_id(&queued.stdout)?;

        let fetch_args = [
            "action",
            "fetch",
            self.model_flag(),
            &self.model,
            &id,
            "--wait",
            "0",
            "--format",
            "json",
        ];
        let output = self.cli.run(fetch_args)?;
        parse_action_result(&output.stdout)
    }
}

impl Environment for CliEnvironment {
    fn info(&self) -> &EnvInfo {
        &self.info
    }

    fn provider_name(&self) -> Option<String> {
        None
    }

    fn name(&self) -> String {
        self.model.clone()
    }

    fn find_unit(&self, unit: &str) -> Result<String, EnvError> {
        let output = self
            .cli
            .run(["status", self.model_flag(), &self.model, "--format", "json"])?;
        let units = parse_status_units(&output.stdout)?;
        match select_unit(&units, unit) {
            Some(found) => Ok(found),
            None => Err(EnvError::UnitNotFound {
                unit: unit.to_string(),
            }),
        }
    }

    fn run_action(
        &self,
        unit: &str,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<ActionResult, EnvError> {
        let result = if self.major_version >= 2 {
            self.run_action_v2(unit, action, params)?
        } else {
            self.run_action_v1(unit, action, params)?
        };
        ensure_completed(unit, action, result)
    }
}

fn render_params(params: &BTreeMap<String, String>) -> Vec<String> {
    params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect()
}

fn ensure_completed(
    unit: &str,
    action: &str,
    result: ActionResult,
) -> Result<ActionResult, EnvError> {
    if result.completed() {
        return Ok(result);
    }
    let reason = match &result.message {
        Some(message) if !message.is_empty() => {
            format!("action status was {}: {message}", result.status)
        }
        _ => format!("action status was {}", result.status),
    };
    Err(EnvError::Action {
        unit: unit.to_string(),
        action: action.to_string(),
        reason,
    })
}

fn parse_model_info(raw: &str) -> Result<EnvInfo, EnvError> {
    let doc: serde_json::Value = serde_json::from_str(raw).map_err(|err| EnvError::Parse {
        context: format!("model info output: {err}"),
    })?;
    let model = model_body(&doc).ok_or_else(|| EnvError::Parse {
        context: "model info output has no model body".to_string(),
    })?;
    let mut provider_type = model
        .get("provider-type")
        .and_then(serde_json::Value::as_str)
        .or_else(|| model.get("type").and_then(serde_json::Value::as_str))
        .ok_or_else(|| EnvError::Parse {
            context: "model info output has no provider type".to_string(),
        })?;
    // Newer controllers report `type` as iaas/caas and move the substrate
    // name into `cloud`.
    if provider_type == "iaas" || provider_type == "caas" {
        if let Some(cloud) = model.get("cloud").and_then(serde_json::Value::as_str) {
            provider_type = cloud;
        }
    }
    Ok(EnvInfo {
        provider_type: provider_type.to_string(),
        name: model
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        region: model
            .get("region")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
    })
}

/// `show-model` nests the model under its name; `get-env` replies with a
/// flat config mapping.
fn model_body(doc: &serde_json::Value) -> Option<&serde_json::Value> {
    if doc.get("provider-type").is_some() || doc.get("type").is_some() {
        return Some(doc);
    }
    doc.as_object().and_then(|models| models.values().next())
}

fn parse_status_units(raw: &str) -> Result<Vec<String>, EnvError> {
    let doc: serde_json::Value = serde_json::from_str(raw).map_err(|err| EnvError::Parse {
        context: format!("status output: {err}"),
    })?;
    // Modern status nests units under `applications`; older releases used
    // `services`.
    let apps = doc
        .get("applications")
        .or_else(|| doc.get("services"))
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| EnvError::Parse {
            context: "status output has no applications".to_string(),
        })?;
    let mut units = Vec::new();
    for app in apps.values() {
        let Some(app_units) = app.get("units").and_then(serde_json::Value::as_object) else {
            continue;
        };
        for (name, unit) in app_units {
            units.push(name.clone());
            if let Some(subs) = unit.get("subordinates").and_then(serde_json::Value::as_object) {
                units.extend(subs.keys().cloned());
            }
        }
    }
    units.sort();
    Ok(units)
}

fn select_unit(units: &[String], spec: &str) -> Option<String> {
    if spec.contains('/') {
        return units.iter().find(|name| name.as_str() == spec).cloned();
    }
    let prefix = format!("{spec}/");
    units.iter().find(|name| name.starts_with(&prefix)).cloned()
}

fn parse_queued_action_id(raw: &str) -> Result<String, EnvError> {
    let doc: serde_json::Value = serde_json::from_str(raw).map_err(|err| EnvError::Parse {
        context: format!("queued action reply: {err}"),
    })?;
    let id = doc
        .get("Action queued with id")
        .and_then(serde_json::Value::as_str)
        .or_else(|| doc.get("action-id").and_then(serde_json::Value::as_str))
        .ok_or_else(|| EnvError::Parse {
            context: "queued action reply had no id".to_string(),
        })?;
    Ok(id.to_string())
}

fn parse_action_result(raw: &str) -> Result<ActionResult, EnvError> {
    let doc: serde_json::Value = serde_json::from_str(raw).map_err(|err| EnvError::Parse {
        context: format!("action output: {err}"),
    })?;
    // `--wait` output is either the result body itself or a mapping keyed
    // by action id.
    let body = if doc.get("status").is_some() {
        &doc
    } else {
        doc.as_object()
            .and_then(|map| map.values().find(|value| value.get("status").is_some()))
            .ok_or_else(|| EnvError::Parse {
                context: "action output has no status".to_string(),
            })?
    };
    let status = body
        .get("status")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| EnvError::Parse {
            context: "action status is not a string".to_string(),
        })?
        .to_string();
    let results = body
        .get("results")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let message = body
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    Ok(ActionResult {
        status,
        results,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_info_parses_nested_show_model_output() {
        let raw = r#"{
            "perf": {
                "name": "perf",
                "type": "ec2",
                "cloud": "aws",
                "region": "us-east-1",
                "life": "alive"
            }
        }"#;
        let info = parse_model_info(raw).expect("parse model info");
        assert_eq!(info.provider_type, "ec2");
        assert_eq!(info.name.as_deref(), Some("perf"));
        assert_eq!(info.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn model_info_remaps_iaas_type_to_cloud() {
        let raw = r#"{"perf": {"name": "perf", "type": "iaas", "cloud": "google"}}"#;
        let info = parse_model_info(raw).expect("parse model info");
        assert_eq!(info.provider_type, "google");
    }

    #[test]
    fn model_info_parses_flat_config_output() {
        let raw = r#"{"type": "ec2", "default-series": "trusty"}"#;
        let info = parse_model_info(raw).expect("parse model info");
        assert_eq!(info.provider_type, "ec2");
        assert_eq!(info.name, None);
    }

    #[test]
    fn model_info_without_provider_type_is_an_error() {
        let err = parse_model_info(r#"{"perf": {"name": "perf"}}"#);
        assert!(matches!(err, Err(EnvError::Parse { .. })));
    }

    #[test]
    fn status_units_include_subordinates() {
        let raw = r#"{
            "applications": {
                "wiki": {
                    "units": {
                        "wiki/0": {
                            "subordinates": {"collectd/0": {}}
                        },
                        "wiki/1": {}
                    }
                },
                "db": {
                    "units": {"db/0": {}}
                }
            }
        }"#;
        let units = parse_status_units(raw).expect("parse status");
        assert_eq!(units, vec!["collectd/0", "db/0", "wiki/0", "wiki/1"]);
    }

    #[test]
    fn status_units_accept_the_older_services_key() {
        let raw = r#"{"services": {"siege": {"units": {"siege/0": {}}}}}"#;
        let units = parse_status_units(raw).expect("parse status");
        assert_eq!(units, vec!["siege/0"]);
    }

    #[test]
    fn select_unit_matches_exact_names() {
        let units = vec!["wiki/0".to_string(), "wiki/1".to_string()];
        assert_eq!(select_unit(&units, "wiki/1").as_deref(), Some("wiki/1"));
        assert_eq!(select_unit(&units, "wiki/2"), None);
    }

    #[test]
    fn select_unit_resolves_bare_application_names() {
        let units = vec![
            "db/0".to_string(),
            "wiki/0".to_string(),
            "wiki/1".to_string(),
        ];
        assert_eq!(select_unit(&units, "wiki").as_deref(), Some("wiki/0"));
        assert_eq!(select_unit(&units, "cache"), None);
    }

    #[test]
    fn action_result_parses_direct_body() {
        let raw = r#"{"status": "completed", "results": {"meta": {"composite": {"value": "100"}}}}"#;
        let result = parse_action_result(raw).expect("parse action result");
        assert!(result.completed());
        assert_eq!(result.results["meta"]["composite"]["value"], "100");
    }

    #[test]
    fn action_result_parses_body_keyed_by_action_id() {
        let raw = r#"{"a1b2": {"status": "failed", "message": "unit agent lost", "results": {}}}"#;
        let result = parse_action_result(raw).expect("parse action result");
        assert_eq!(result.status, "failed");
        assert_eq!(result.message.as_deref(), Some("unit agent lost"));
    }

    #[test]
    fn action_result_without_status_is_an_error() {
        assert!(matches!(
            parse_action_result(r#"{"a1b2": {"results": {}}}"#),
            Err(EnvError::Parse { .. })
        ));
    }

    #[test]
    fn queued_action_id_parses_both_reply_shapes() {
        let verbose = r#"{"Action queued with id": "a1b2"}"#;
        assert_eq!(
            parse_queued_action_id(verbose).expect("parse id"),
            "a1b2"
        );
        let terse = r#"{"action-id": "c3d4"}"#;
        assert_eq!(parse_queued_action_id(terse).expect("parse id"), "c3d4");
    }

    #[test]
    fn failed_action_maps_to_an_action_error() {
        let result = ActionResult {
            status: "failed".to_string(),
            results: serde_json::json!({}),
            message: Some("exit status 1".to_string()),
        };
        let err = ensure_completed("siege/0", "siege", result).expect_err("must fail");
        match err {
            EnvError::Action {
                unit,
                action,
                reason,
            } => {
                assert_eq!(unit, "siege/0");
                assert_eq!(action, "siege");
                assert!(reason.contains("exit status 1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn params_render_as_key_value_pairs() {
        let mut params = BTreeMap::new();
        params.insert("concurrency".to_string(), "4".to_string());
        params.insert("time".to_string(), "30".to_string());
        assert_eq!(render_params(&params), vec!["concurrency=4", "time=30"]);
    }

    #[test]
    fn missing_binary_reports_an_io_error() {
        let cli = JujuCli {
            binary: PathBuf::from("/nonexistent/juju"),
        };
        let err = cli.run(["status"]).expect_err("binary is absent");
        assert!(matches!(err, EnvError::Io { .. }));
    }

    #[test]
    fn nonzero_exit_reports_command_failed() {
        let cli = JujuCli {
            binary: PathBuf::from("false"),
        };
        let err = cli.run(["status"]).expect_err("false always fails");
        match err {
            EnvError::CommandFailed { status, .. } => assert_eq!(status, Some(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn connector_wraps_exhausted_retries_in_a_connect_error() {
        let mut connector = CliConnector::with_retry(
            2,
            RetryConfig {
                max_attempts: 2,
                initial_delay_ms: 0,
                backoff_multiplier: 2,
            },
        );
        connector.cli.binary = PathBuf::from("/nonexistent/juju");
        let err = connector.connect("aws").err().expect("connect must fail");
        match err {
            EnvError::Connect { controller, .. } => assert_eq!(controller, "aws"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
