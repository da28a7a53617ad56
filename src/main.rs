use std::env;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mintgate_backend::config::MintConfig;
use mintgate_backend::handlers::{admin, mint_order, webhook};
use mintgate_backend::jobs::mint_verify_worker;
use mintgate_backend::services::verifier::MintTxVerifier;
use mintgate_backend::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mintgate_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let config = MintConfig::from_env();
    let verifier = Arc::new(
        MintTxVerifier::new(&config).expect("Failed to construct chain verifier"),
    );

    let state = AppState {
        db,
        config,
        verifier,
    };

    // Background verification worker; keep the handle so the shutdown
    // channel stays open for the life of the process.
    let _worker_shutdown = mint_verify_worker::spawn(state.clone());

    let app = Router::new()
        .route("/", get(health))
        .route("/api/mint-orders", post(mint_order::create_mint_order))
        .route(
            "/api/mint-orders/{id}/confirm",
            post(mint_order::confirm_mint_order),
        )
        .route("/api/mint-orders/{id}", get(mint_order::get_mint_order))
        .route("/api/mint-orders/webhook", post(webhook::confirm_via_webhook))
        .route(
            "/api/admin/mint-verify-jobs/stats",
            get(admin::verify_job_stats),
        )
        .route("/api/admin/mint-verify-jobs", get(admin::list_verify_jobs))
        .route(
            "/api/admin/mint-verify-jobs/{order_id}/retry",
            post(admin::force_retry_verify_job),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind server address");

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "ok"
}
