pub mod backfill;
pub mod doctor;
pub mod migrate;

use serde::Serialize;
use serde_json::{json, Value};

/// What a command hands back to the process shell: an exit code and one
/// line of JSON already rendered for stdout.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandReport<'a> {
    command: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    details: Value,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::render(command, "ok", None, message.into(), Value::Null, 0)
    }

    /// Success with a structured payload alongside the human message, for
    /// commands that produce counters worth machine-reading.
    pub fn success_with_details(
        command: &str,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::render(command, "ok", None, message.into(), details, 0)
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::render(command, "error", Some(error_class), message.into(), Value::Null, exit_code)
    }

    fn render(
        command: &str,
        status: &str,
        error_class: Option<&str>,
        message: String,
        details: Value,
        exit_code: u8,
    ) -> Self {
        let report = CommandReport { command, status, error_class, message, details };
        let output = serde_json::to_string(&report).unwrap_or_else(|error| {
            json!({
                "command": command,
                "status": "error",
                "error_class": "serialization",
                "message": error.to_string(),
            })
            .to_string()
        });
        Self { exit_code, output }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::CommandResult;

    #[test]
    fn success_omits_error_class_and_details() {
        let result = CommandResult::success("migrate", "done");
        let payload: Value = serde_json::from_str(&result.output).expect("valid JSON");

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["status"], "ok");
        assert!(payload.get("error_class").is_none());
        assert!(payload.get("details").is_none());
    }

    #[test]
    fn details_payload_survives_rendering() {
        let result = CommandResult::success_with_details(
            "backfill",
            "run finished",
            json!({"calls_upserted": 3}),
        );
        let payload: Value = serde_json::from_str(&result.output).expect("valid JSON");

        assert_eq!(payload["details"]["calls_upserted"], 3);
    }

    #[test]
    fn failure_carries_class_and_exit_code() {
        let result = CommandResult::failure("doctor", "db_connectivity", "no database", 4);
        let payload: Value = serde_json::from_str(&result.output).expect("valid JSON");

        assert_eq!(result.exit_code, 4);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "db_connectivity");
    }
}
