#![allow(non_snake_case)]

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use calendarAgentClient::cli::{self, Cli};
use calendarAgentClient::config::{AppConfig, ClientSettings};
use calendarAgentClient::runtime::{self, ClientRuntime};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let settings = match AppConfig::load().and_then(|config| ClientSettings::resolve(&config)) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    runtime::init_tracing(&settings.log_level);

    let (client, changes) = ClientRuntime::from_settings(&settings);
    match cli::cli(args, client, changes).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
