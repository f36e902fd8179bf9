//! Command-line front-end for the region recorder.

mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use cli::{Cli, Command, ConfigCommand, RecordArgs};
pub use config::{default_config_path, ConfigStore, CONFIG_FILE_NAME};

/// Initialize logging.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "regionrec=debug,regionrec_lib=debug,regionrec_engine=debug,regionrec_capture=debug,regionrec_audio=debug,regionrec_encoder=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Parse the command line and dispatch.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    info!("regionrec starting");

    let mut config = ConfigStore::load(cli.config.unwrap_or_else(default_config_path));

    match cli.command {
        Command::Record(args) => commands::record(&mut config, args),
        Command::Probe => commands::probe(),
        Command::Devices => commands::devices(),
        Command::Config(command) => commands::config(&mut config, command),
    }
}
