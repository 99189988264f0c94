use std::process::ExitCode;

fn main() -> ExitCode {
    match gastobot_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Gastobot failed to start: {e}");
            ExitCode::FAILURE
        }
    }
}
