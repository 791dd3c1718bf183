use std::process::ExitCode;

fn main() -> ExitCode {
    match netd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("netd: {error}");
            ExitCode::FAILURE
        }
    }
}
