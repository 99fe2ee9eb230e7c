use whattodo::config::ProjectsConfig;
use whattodo::infrastructure::ProjectsState;
use whattodo::{api, db, server};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    server::init_tracing();

    let config = ProjectsConfig::from_env();
    if !config.service.oauth.has_client_credentials() {
        tracing::warn!("Keycloak client credentials incomplete, project task listing will fail");
    }

    let db = db::init_db(&config.service.database_url)
        .await
        .expect("Failed to initialize database");

    let state = ProjectsState::new(db, &config).expect("Failed to build HTTP clients");
    let app =
        api::projects_router(state).layer(server::cors_layer(&config.service.cors_allowed_origins));

    server::serve(app, &config.service.service_name, config.service.port)
        .await
        .expect("Failed to start server");
}
