//! zed - command-line front end for Zed data lakes

use std::process::ExitCode;

use zedcli::{cli, logging};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            cli::report(&err);
            ExitCode::FAILURE
        }
    }
}
