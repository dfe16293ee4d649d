use std::process::ExitCode;

fn main() -> ExitCode {
    pozinox_cli::run()
}
