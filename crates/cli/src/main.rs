use std::process::ExitCode;

fn main() -> ExitCode {
    linehaul_cli::run()
}
