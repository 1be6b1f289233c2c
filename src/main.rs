use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_system::{config::Config, controllers, services::cleanup::CleanupService, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cinema Marketplace API");

    let cleanup_interval = config.booking.cleanup_interval_seconds;
    let port = config.app.port;

    // Подключения к БД и Redis, миграции, прогрев кеша в фоне
    let app_state = AppState::new(config)
        .await
        .expect("Failed to initialize application state");
    info!("Database and Redis connected");

    // --- Фоновые задачи ---

    // Очистка просроченных удержаний мест
    let cleanup = CleanupService::new(app_state.clone());
    task::spawn(async move {
        loop {
            cleanup.run_expiry_sweep().await;
            tokio::time::sleep(Duration::from_secs(cleanup_interval)).await;
        }
    });

    // --- Веб-сервер ---

    let app = Router::new()
        .route("/", get(|| async { "Cinema Marketplace API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
