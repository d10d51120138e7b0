use std::net::SocketAddr;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blackwell_api::{create_router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,blackwell_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting Blackwell ticketing API");

    // Migrations run on a small dedicated pool before the server accepts
    // traffic; the request pool never competes with DDL.
    let migration_pool = blackwell_shared::create_migration_pool(&config.database_url).await?;
    blackwell_shared::run_migrations(&migration_pool).await?;
    migration_pool.close().await;
    tracing::info!("Database migrations applied");

    let pool = blackwell_shared::create_pool(&config.database_url).await?;
    let state = AppState::new(pool, config.clone())?;

    let cors = build_cors_layer();
    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(address = %config.bind_address, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// CORS policy from ALLOWED_ORIGINS (comma-separated). Without it the API
/// only serves same-origin traffic, which is correct for production where
/// the site proxies to us.
fn build_cors_layer() -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-admin-secret")]);

    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse::<HeaderValue>().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS origins configured");
            layer.allow_origin(AllowOrigin::list(parsed))
        }
        Err(_) => layer,
    }
}
