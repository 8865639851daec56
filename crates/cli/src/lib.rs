pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "linehaul",
    about = "Linehaul operator CLI",
    long_about = "Operate Linehaul migrations, readiness checks, and call-history backfills.",
    after_help = "Examples:\n  linehaul doctor --json\n  linehaul migrate\n  linehaul backfill --mode missing_only --max-pages 20"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, voice API credential readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Backfill historical voice-agent conversations into call logs and leads")]
    Backfill {
        #[arg(long, default_value = "missing_only", help = "missing_only | conversation_id | date_range | all")]
        mode: String,
        #[arg(long, help = "Agent id to backfill (defaults to the configured agent)")]
        agent_id: Option<String>,
        #[arg(long, help = "Account that owns the imported rows")]
        account_id: Option<String>,
        #[arg(long, help = "Single conversation id (conversation_id mode)")]
        conversation_id: Option<String>,
        #[arg(long, help = "Range start as unix seconds (date_range mode)")]
        start_unix: Option<i64>,
        #[arg(long, help = "Range end as unix seconds (date_range mode)")]
        end_unix: Option<i64>,
        #[arg(long, default_value_t = 50, help = "Maximum listing pages to walk")]
        max_pages: u32,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Backfill {
            mode,
            agent_id,
            account_id,
            conversation_id,
            start_unix,
            end_unix,
            max_pages,
        } => commands::backfill::run(commands::backfill::BackfillArgs {
            mode,
            agent_id,
            account_id,
            conversation_id,
            start_unix,
            end_unix,
            max_pages,
        }),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
