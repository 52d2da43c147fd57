//! CampLink relay server: room-scoped realtime event fan-out.
//!
//! An axum WebSocket server that relays camp chat, session presence and
//! control signals, screen-share toggles and user notifications between
//! portal clients. Nothing is stored; every event goes to whoever is in the
//! room at that moment.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:4000
//! cargo run --bin camplink-relay
//!
//! # Run on custom address
//! cargo run --bin camplink-relay -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! RELAY_ADDR=127.0.0.1:8080 cargo run --bin camplink-relay
//! ```

use std::sync::Arc;
use std::time::Duration;

use camplink_relay::config::{RelayCliArgs, RelayConfig};
use camplink_relay::relay::{self, RelayState};
use clap::Parser;

/// Time allowed for close frames to flush on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        max_frame_size = config.max_frame_size,
        "starting camplink relay server"
    );

    let state = Arc::new(RelayState::with_config(config.max_frame_size));

    match relay::start_server_with_state(&config.bind_addr, Arc::clone(&state)).await {
        Ok((bound_addr, mut handle)) => {
            tracing::info!(addr = %bound_addr, "relay server listening");
            tokio::select! {
                result = &mut handle => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "relay server task failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(
                        connections = state.connection_count(),
                        "shutdown requested, closing connections"
                    );
                    state.close_all_connections();
                    tokio::time::sleep(SHUTDOWN_GRACE).await;
                    handle.abort();
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay server");
            std::process::exit(1);
        }
    }
}
