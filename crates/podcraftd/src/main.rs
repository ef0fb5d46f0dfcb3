use std::process::ExitCode;

fn main() -> ExitCode {
    match podcraftd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("podcraftd: {error}");
            ExitCode::FAILURE
        }
    }
}
