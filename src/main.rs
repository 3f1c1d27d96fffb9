use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use gimbal_control::config::{Cli, Config};

#[tokio::main]
async fn main() {
    let config = Config::from(Cli::parse());

    // Setup logging (--debug also shows raw bus traffic; RUST_LOG still applies)
    let level = if config.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if let Err(e) = gimbal_control::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
