use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Connect, monitor and shut down database adapters", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "TETHER_CONFIG", default_value = "tether.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect every adapter, print its health and disconnect.
    ///
    /// Exits non-zero unless every adapter is ready.
    Check {
        /// Print the health summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Connect every adapter and monitor it until SIGINT or SIGTERM
    Watch {
        /// Seconds between health checks; defaults to `health.interval_secs`
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
    /// Run a command once every adapter is ready, e.g. a migration tool
    Exec {
        /// Working directory for the command
        #[arg(long)]
        workdir: Option<PathBuf>,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}
