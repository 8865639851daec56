use std::env;
use std::sync::{Mutex, OnceLock};

use linehaul_cli::commands::{doctor, migrate};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("LINEHAUL_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(
            payload["message"].as_str().is_some_and(|message| message.contains("version 1")),
            "migrate should report the bundled schema version"
        );
    });
}

#[test]
fn migrate_reports_config_failure_on_bad_log_format() {
    with_env(
        &[
            ("LINEHAUL_DATABASE_URL", "sqlite::memory:"),
            ("LINEHAUL_LOG_FORMAT", "rainbow"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn doctor_flags_missing_voice_credential() {
    with_env(&[("LINEHAUL_DATABASE_URL", "sqlite::memory:")], || {
        let output = doctor::run(true);
        let report: Value = serde_json::from_str(&output).expect("doctor emits JSON");

        assert_eq!(report["overall_status"], "fail");
        let voice_check = report["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .find(|check| check["name"] == "voice_api_readiness")
            .expect("voice readiness check present");
        assert_eq!(voice_check["status"], "fail");
    });
}

#[test]
fn doctor_passes_with_credential_agent_and_database() {
    with_env(
        &[
            ("LINEHAUL_DATABASE_URL", "sqlite::memory:"),
            ("LINEHAUL_VOICE_API_KEY", "test-key"),
            ("LINEHAUL_VOICE_AGENT_ID", "agent_01JX"),
        ],
        || {
            let output = doctor::run(true);
            let report: Value = serde_json::from_str(&output).expect("doctor emits JSON");

            assert_eq!(report["overall_status"], "pass");
            for check in report["checks"].as_array().expect("checks array") {
                assert_eq!(check["status"], "pass", "check {} should pass", check["name"]);
            }
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LINEHAUL_DATABASE_URL",
        "LINEHAUL_LOG_LEVEL",
        "LINEHAUL_LOG_FORMAT",
        "LINEHAUL_VOICE_API_KEY",
        "LINEHAUL_VOICE_BASE_URL",
        "LINEHAUL_VOICE_AGENT_ID",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, previous) in previous_values {
        match previous {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
