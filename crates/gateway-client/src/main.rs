//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_TOKEN=... cargo run -p gateway-client
//! ```
//!
//! Configuration is loaded from environment variables. Dispatch event names
//! are logged until Ctrl-C.

use gateway_client::{GatewayClient, WsConnector};
use gateway_common::{try_init_tracing_with_config, GatewayConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Gateway client stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env();

    // Tracing comes up before the config error is reported
    let tracing_config = config
        .as_ref()
        .map(|c| TracingConfig::for_environment(c.env))
        .unwrap_or_default();
    if let Err(e) = try_init_tracing_with_config(&tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    let config = config.map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.env,
        url = %config.gateway_url(),
        intents = %config.intents,
        shard = ?config.shard,
        "Configuration loaded"
    );

    let (client, mut events) =
        GatewayClient::new(WsConnector, config.gateway_url(), config.identify())?;
    let handle = client.handle();

    let session = tokio::spawn(client.run());

    let consumer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(event = %event.name, seq = event.sequence, "Dispatch");
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Ctrl-C received, shutting down");
            handle.shutdown();
        }
        _ = consumer => {}
    }

    session.await??;
    Ok(())
}
