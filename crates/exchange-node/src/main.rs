//! Exchange Node binary
//!
//! Runs the Dystopian Exchange market: schedulers, HTTP API and admin socket.

use exchange_node::{ExchangeConfig, ExchangeNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exchange_node=info,exchange_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Exchange Node");

    let config = ExchangeConfig::from_env()?;

    let node = ExchangeNode::new(config).await?;
    node.run().await?;

    Ok(())
}
