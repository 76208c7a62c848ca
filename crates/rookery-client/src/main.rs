//! Rookery terminal client.

use rookery_core::MatchStateMachine;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod connection;
mod protocol;
mod session;

use config::ClientConfig;
use session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(player_id = %config.player_id, "Starting Rookery client...");

    let (inputs, rx) = mpsc::unbounded_channel();
    let connection = connection::connect(&config.server_url, inputs.clone()).await?;
    let ticker = session::spawn_ticker(inputs.clone());
    let stdin = commands::spawn_stdin_reader(inputs, config.player_id);

    Session::new(MatchStateMachine::standard(config.player_id), connection.sender())
        .run(rx)
        .await;

    ticker.abort();
    stdin.abort();
    connection.close();
    Ok(())
}
