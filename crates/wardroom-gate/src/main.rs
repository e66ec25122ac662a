//! Wardroom Node binary
//!
//! Serves the rank-gated app shell, session endpoints and data API.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wardroom_gate::{GateConfig, GateNode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wardroom_node=info,wardroom_gate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Wardroom Node");

    let config = GateConfig::from_env()?;

    let node = GateNode::new(config)?;
    node.run().await?;

    Ok(())
}
