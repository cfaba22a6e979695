use std::process::ExitCode;

fn main() -> ExitCode {
    leadneedle_cli::run()
}
