//! telescan CLI
//!
//! Seeds from channel keyword searches, crawls channels through the session
//! gateway and records flagged messages until interrupted.

use std::sync::Arc;

use clap::Parser;
use telescan::{
    error::Result,
    models::{Config, Keywords},
    pipeline,
    transport::HttpTransport,
    utils::install_signal_handler,
};

const CONFIG_ENV: &str = "TELESCAN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "telescan.toml";

/// telescan - channel crawler and message classifier
#[derive(Parser, Debug)]
#[command(
    name = "telescan",
    version,
    about = "Crawls channels, flags messages matching keywords and follows mentions"
)]
struct Cli {
    /// Keywords that flag a message
    #[arg(long = "message_keywords", num_args = 1.., required = true)]
    message_keywords: Vec<String>,

    /// Keywords used to search for entry-point channels (overrides config)
    #[arg(long = "channel_keywords", num_args = 1..)]
    channel_keywords: Option<Vec<String>>,
}

/// Initialize logging; `RUST_LOG` overrides the default level.
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    log::info!("telescan starting...");

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = Config::load_or_default(&config_path);
    if let Some(channel_keywords) = cli.channel_keywords {
        config.channel_keywords = channel_keywords;
    }

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    log::info!("Loaded configuration from {config_path}");

    let transport = Arc::new(HttpTransport::new(&config.transport)?);
    let cancel = install_signal_handler();

    pipeline::run_crawler(
        &config,
        Keywords::new(&cli.message_keywords),
        transport,
        cancel,
    )
    .await?;

    log::info!("Done!");

    Ok(())
}
