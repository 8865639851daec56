use linehaul_core::config::{AppConfig, LoadOptions};
use linehaul_db::{connect, migrations};

use crate::commands::CommandResult;

type CommandFailure = (&'static str, String, u8);

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(apply(&config)) {
        Ok(()) => CommandResult::success(
            "migrate",
            format!("schema is current at version {}", migrations::latest_version()),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}

async fn apply(config: &AppConfig) -> Result<(), CommandFailure> {
    let pool = connect(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

    let outcome = migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8));
    pool.close().await;
    outcome
}
