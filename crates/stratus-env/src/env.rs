use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Identity facts reported by a connected environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvInfo {
    /// Raw substrate identifier, e.g. `ec2` or `gce`.
    pub provider_type: String,
    /// Model name, when the environment reports one.
    #[serde(default)]
    pub name: Option<String>,
    /// Cloud region, when the environment reports one.
    #[serde(default)]
    pub region: Option<String>,
}

/// Outcome of a single action invocation on a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Terminal status reported by the environment, e.g. `completed`.
    pub status: String,
    /// Free-form result payload published by the action.
    pub results: serde_json::Value,
    /// Failure detail reported alongside non-completed statuses.
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionResult {
    pub fn completed(&self) -> bool {
        self.status == "completed"
    }
}

/// A connected, usable cloud environment.
///
/// Implementations wrap whatever transport reaches the substrate; callers
/// only see units and actions.
pub trait Environment: Send + Sync {
    /// Identity facts captured when the connection was established.
    fn info(&self) -> &EnvInfo;

    /// Operator-facing provider label, when the environment carries one.
    ///
    /// Returns `None` when the label should be derived from
    /// [`EnvInfo::provider_type`] instead.
    fn provider_name(&self) -> Option<String>;

    /// Environment name handed to external tooling, e.g. a model name.
    fn name(&self) -> String;

    /// Resolves a unit spec such as `siege/0` (or a bare application name)
    /// to the name of a live unit.
    fn find_unit(&self, unit: &str) -> Result<String, EnvError>;

    /// Invokes a named action on a unit and waits for its result.
    fn run_action(
        &self,
        unit: &str,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<ActionResult, EnvError>;
}

/// Establishes connections to controllers by name.
pub trait Connector: Send + Sync {
    fn connect(&self, controller: &str) -> Result<Box<dyn Environment>, EnvError>;
}
