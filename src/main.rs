use std::process::ExitCode;

use forjj::ui::output;

fn main() -> ExitCode {
    match forjj::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
