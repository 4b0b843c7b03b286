//! avdfleet - run fresh copies of an Android Virtual Device side by side

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use avdfleet_cli::cli::Cli;
use avdfleet_cli::output::json;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let json_errors = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            match json::format_error(&message, json::error_code(&e)) {
                Ok(doc) if json_errors => println!("{doc}"),
                _ => eprintln!("Error: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}
