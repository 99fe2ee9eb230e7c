use whattodo::config::TasksConfig;
use whattodo::infrastructure::TasksState;
use whattodo::{api, db, server};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    server::init_tracing();

    let config = TasksConfig::from_env();

    let db = db::init_db(&config.service.database_url)
        .await
        .expect("Failed to initialize database");

    let state = TasksState::new(db, &config).expect("Failed to build HTTP clients");
    let app = api::tasks_router(state).layer(server::cors_layer(&config.service.cors_allowed_origins));

    server::serve(app, &config.service.service_name, config.service.port)
        .await
        .expect("Failed to start server");
}
