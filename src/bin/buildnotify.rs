#[path = "buildnotify/app.rs"]
mod app;
#[path = "buildnotify/cli.rs"]
mod cli;
#[path = "buildnotify/shutdown.rs"]
mod shutdown;

use std::error::Error as StdError;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = cli::Cli::parse_args();
    match app::run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            std::process::ExitCode::FAILURE
        }
    }
}

fn report_error(err: &buildnotify::error::Error) {
    eprintln!("Error: {err}");
    let mut source: Option<&dyn StdError> = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}
