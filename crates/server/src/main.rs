use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use axum::http::{HeaderName, Method};
use tower_http::cors::CorsLayer;

use parley_server::{config::Config, routes, tenant::TenantResolver, AppState};
use parley_shared::constants::APP_NAME;

#[tokio::main]
async fn main() {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_server=info".into()),
        )
        .init();

    let config = Config::from_env();

    let resolver = TenantResolver::from_config(&config)
        .await
        .expect("Failed to initialize tenant directory");

    // Open the default store up front so a bad DEFAULT_DATABASE_URL fails fast
    resolver
        .default_store()
        .await
        .expect("Failed to open default store");

    let tenant_header = HeaderName::from_bytes(config.tenant_header.as_bytes())
        .expect("Invalid TENANT_HEADER");

    let state = Arc::new(AppState::new(config.clone(), resolver));

    // Forget idle rate-limit windows
    let pruning = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            pruning.rate_limiter.prune(Instant::now());
        }
    });

    // Build router
    let app = routes::build_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    tenant_header,
                ])
                .allow_credentials(true),
        );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");

    tracing::info!("{} server running on {}", APP_NAME, addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
