// server/src/main.rs

// Entry point for the clinic server. Parses the command line and dispatches.

use anyhow::Result;
use clinic_server::cli::start_cli;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    start_cli().await
}
