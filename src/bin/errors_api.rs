use std::time::Duration;

use whattodo::config::ErrorsConfig;
use whattodo::infrastructure::ErrorsState;
use whattodo::services::error_service;
use whattodo::{api, db, server};

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    server::init_tracing();

    let config = ErrorsConfig::from_env();

    let db = db::init_db(&config.service.database_url)
        .await
        .expect("Failed to initialize database");

    let state = ErrorsState::new(db, &config);

    // Expired entries are removed hourly
    tokio::spawn(error_service::run_retention(
        state.repo.clone(),
        config.retention_days,
        RETENTION_SWEEP_INTERVAL,
    ));

    let app =
        api::errors_router(state).layer(server::cors_layer(&config.service.cors_allowed_origins));

    server::serve(app, &config.service.service_name, config.service.port)
        .await
        .expect("Failed to start server");
}
