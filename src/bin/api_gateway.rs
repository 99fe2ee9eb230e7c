use std::time::Duration;

use whattodo::config::GatewayConfig;
use whattodo::gateway::{self, GatewayState};
use whattodo::server;

const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    server::init_tracing();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid gateway configuration: {}", e);
            std::process::exit(1);
        }
    };

    let state = GatewayState::from_config(&config).expect("Failed to build HTTP clients");

    let limiter = state.limiter().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.prune();
        }
    });

    let app = gateway::router(state).layer(server::cors_layer(&config.cors_allowed_origins));

    server::serve(app, "API Gateway", config.port)
        .await
        .expect("Failed to start server");
}
