//! Per-plan execution state machine.
//!
//! A plan run walks CONNECTING -> TESTING -> BENCHMARKING -> MERGING ->
//! PERSISTED, with two early exits for the common external failures.

use serde::{Deserialize, Serialize};

/// Where a single test plan is in its run pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanState {
    /// Establishing a connection to the target environment
    Connecting,
    /// Test suite running against the connected environment
    Testing,
    /// Benchmark actions running
    Benchmarking,
    /// Merging results into the report and index
    Merging,
    /// Report and index written through the datastore
    Persisted,
    /// Environment unreachable; nothing was run
    ConnectFailed,
    /// Test suite could not be executed
    TestFailed,
}

impl std::fmt::Display for PlanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            PlanState::Connecting => "CONNECTING",
            PlanState::Testing => "TESTING",
            PlanState::Benchmarking => "BENCHMARKING",
            PlanState::Merging => "MERGING",
            PlanState::Persisted => "PERSISTED",
            PlanState::ConnectFailed => "CONNECT_FAILED",
            PlanState::TestFailed => "TEST_FAILED",
        };
        f.write_str(tag)
    }
}

impl PlanState {
    /// Returns true once the plan can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanState::Persisted | PlanState::ConnectFailed | PlanState::TestFailed
        )
    }

    /// Returns true if the plan ended without persisting results.
    pub fn is_failure(&self) -> bool {
        matches!(self, PlanState::ConnectFailed | PlanState::TestFailed)
    }

    /// Returns true if the plan completed its full pipeline.
    pub fn is_success(&self) -> bool {
        matches!(self, PlanState::Persisted)
    }
}
