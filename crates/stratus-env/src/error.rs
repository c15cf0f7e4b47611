use std::string::FromUtf8Error;

/// Errors raised while talking to a cloud environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// The controller could not be reached or its model is unusable.
    #[error("failed to connect to controller `{controller}`: {reason}")]
    Connect { controller: String, reason: String },

    /// No deployed unit matched the requested spec.
    #[error("no unit matching `{unit}` in the environment")]
    UnitNotFound { unit: String },

    /// An action ran but did not complete successfully.
    #[error("action `{action}` on `{unit}` failed: {reason}")]
    Action {
        unit: String,
        action: String,
        reason: String,
    },

    /// Failed to spawn the environment CLI process.
    #[error("failed to run {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The environment CLI produced output that was not valid UTF-8.
    #[error("{command} produced non-UTF8 output: {source}")]
    NonUtf8Output {
        command: String,
        #[source]
        source: FromUtf8Error,
    },

    /// The environment CLI exited with a non-zero status.
    #[error("{command} failed with status {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The environment CLI replied with output we could not interpret.
    #[error("failed to parse environment output: {context}")]
    Parse { context: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_names_the_controller() {
        let err = EnvError::Connect {
            controller: "aws".to_string(),
            reason: "timed out".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to connect to controller `aws`: timed out"
        );
    }

    #[test]
    fn unit_not_found_names_the_unit() {
        let err = EnvError::UnitNotFound {
            unit: "siege/0".to_string(),
        };
        assert_eq!(err.to_string(), "no unit matching `siege/0` in the environment");
    }

    #[test]
    fn action_error_names_unit_and_action() {
        let err = EnvError::Action {
            unit: "siege/0".to_string(),
            action: "siege".to_string(),
            reason: "action status was failed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "action `siege` on `siege/0` failed: action status was failed"
        );
    }

    #[test]
    fn command_failed_includes_stderr() {
        let err = EnvError::CommandFailed {
            command: "juju status".to_string(),
            status: Some(1),
            stdout: String::new(),
            stderr: "model not found".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("juju status"));
        assert!(rendered.contains("model not found"));
    }
}
