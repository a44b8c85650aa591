//! `tether` - connect, monitor and shut down the configured database adapters

mod args;
mod commands;
mod logging;
mod output;
mod process;

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;

use args::{Cli, Commands};
use commands::Runtime;
use process::ProcessExecutor;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli.config)?;
    let _logging = logging::init(&logging::LoggingConfig::from(&config.observability))?;
    tracing::info!(config = %cli.config.display(), "tether starting");

    let adapter_names = config
        .adapters
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let runtime = Runtime::build(config)?;
    let success = match cli.command {
        Commands::Check { json } => commands::check(&runtime, json).await?,
        Commands::Watch { interval } => {
            commands::watch(&runtime, interval.map(Duration::from_secs)).await?;
            true
        }
        Commands::Exec { command, workdir } => {
            // The child sees which adapters were verified ready
            let mut executor = ProcessExecutor::new().with_env("TETHER_ADAPTERS", adapter_names);
            if let Some(dir) = workdir {
                executor = executor.with_working_dir(dir);
            }
            commands::exec(&runtime, &executor, &command).await?
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
