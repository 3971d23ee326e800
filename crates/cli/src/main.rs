use std::process::ExitCode;

fn main() -> ExitCode {
    aisdr_cli::run()
}
