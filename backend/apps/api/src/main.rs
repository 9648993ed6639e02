//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::application::{AuthConfig, AuthService};
use auth::domain::clock::SystemClock;
use auth::domain::collaborator::{EmailSender, GeoLookup};
use auth::domain::repository::AuthStore;
use auth::infra::geo::DEFAULT_GEO_LOOKUP_URL;
use auth::infra::{IpInfoGeoLookup, LogEmailSender, PgAuthStore, ResendEmailSender};
use auth::auth_router;
use axum::{
    Router, http,
    http::{Method, header},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,audit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Auth configuration
    let auth_config = if cfg!(debug_assertions) && env::var("AUTH_TOKEN_SECRET").is_err() {
        tracing::warn!("AUTH_TOKEN_SECRET not set, using a random development secret");
        AuthConfig::development()
    } else {
        AuthConfig::from_env()?
    };
    let auth_config = Arc::new(auth_config);

    // Database connection
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in environment"))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let store = Arc::new(PgAuthStore::new(pool.clone()));

    // Outbound collaborators
    let geo_url = env::var("GEO_LOOKUP_URL").unwrap_or_else(|_| DEFAULT_GEO_LOOKUP_URL.to_string());
    let geo = Arc::new(IpInfoGeoLookup::new(geo_url, auth_config.outbound_timeout)?);

    match env::var("RESEND_API_KEY") {
        Ok(api_key) if !api_key.trim().is_empty() => {
            let from = env::var("MAIL_FROM")
                .unwrap_or_else(|_| "POS <noreply@localhost>".to_string());
            let mailer = Arc::new(ResendEmailSender::new(
                api_key.trim(),
                from,
                auth_config.outbound_timeout,
            )?);
            serve(store, mailer, geo, auth_config).await
        }
        _ => {
            tracing::warn!("RESEND_API_KEY not set, emails are only logged");
            serve(store, Arc::new(LogEmailSender), geo, auth_config).await
        }
    }
}

async fn serve<R, M, G>(
    store: Arc<R>,
    mailer: Arc<M>,
    geo: Arc<G>,
    auth_config: Arc<AuthConfig>,
) -> anyhow::Result<()>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let service = Arc::new(AuthService::new(
        store,
        mailer,
        geo,
        auth_config,
        Arc::new(SystemClock),
    ));

    // Startup cleanup
    // Errors here should not prevent server startup
    match service.run_maintenance().await {
        Ok(report) => {
            tracing::info!(
                sessions_closed = report.sessions_closed,
                reset_tokens_deleted = report.reset_tokens_deleted,
                "Auth cleanup completed"
            );
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Auth cleanup failed, continuing anyway"
            );
        }
    }

    // Periodic expiry sweep
    let sweep_interval = env::var("SESSION_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
    let sweeper = service.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval));
        // the first tick completes immediately; startup already swept
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = sweeper.run_maintenance().await {
                tracing::warn!(error = %e, "Periodic auth cleanup failed");
            }
        }
    });

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/auth", auth_router(service))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 31113)));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
