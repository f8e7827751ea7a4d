//! mural relay server binary.
//!
//! Serves one shared canvas over WebSocket. Configuration comes from the
//! environment, falling back to the defaults in [`RelayConfig`]:
//!
//! - `MURAL_ADDR`   — bind address (`host:port`)
//! - `MURAL_WIDTH`  — canvas width in pixels
//! - `MURAL_HEIGHT` — canvas height in pixels

use std::env;

use log::info;

use mural_sync::server::{RelayConfig, RelayServer};

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut config = RelayConfig::default();
    if let Ok(addr) = env::var("MURAL_ADDR") {
        config.bind_addr = addr;
    }
    config.width = env_parse("MURAL_WIDTH", config.width);
    config.height = env_parse("MURAL_HEIGHT", config.height);

    info!(
        "starting relay: {}x{} canvas at {}",
        config.width, config.height, config.bind_addr
    );

    let server = RelayServer::new(config).expect("invalid canvas configuration");
    server.run().await.expect("relay server failed");
}
