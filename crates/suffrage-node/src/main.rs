//! Suffrage Node binary
//!
//! One voting unit of the Suffrage mesh.

use suffrage_node::NodeConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "suffrage_node=info,suffrage_consensus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NodeConfig::from_env()?;
    tracing::info!(node = %config.id, faces = config.wired_faces().count(), "Starting Suffrage Node");

    tokio::select! {
        result = suffrage_node::run(config) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    Ok(())
}
