#![cfg(not(tarpaulin_include))]

use analyst::app;
use analyst::config::ServerConfig;
use clap::Parser;
use env_logger::Env;

/// Main entry point for the web application
///
/// Reads configuration from the command line and environment (the API key
/// usually comes from `GEMINI_API_KEY`), then serves the upload page and the
/// analysis endpoint until stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    app::run(config).await
}
