use std::sync::Arc;

use axum::{extract::Request, ServiceExt};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refund_desk::{
    api::state::AppState,
    app,
    config::Settings,
    iban::ApiNinjasClient,
    notifications::create_mailer,
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refund_desk=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    if settings.auth.jwt_secret == Settings::default().auth.jwt_secret {
        tracing::warn!("auth.jwt_secret is the built-in default; set REFUND_DESK__AUTH__JWT_SECRET");
    }

    tracing::info!("Starting Refund Desk on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    if settings.iban.api_key.is_empty() {
        tracing::warn!("No IBAN API key configured; every IBAN lookup will fail");
    }
    let iban_client = Arc::new(ApiNinjasClient::new(&settings.iban));
    let mailer = create_mailer(&settings.email)?;
    tracing::info!("Status emails are sent via {}", mailer.name());

    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        &settings,
        iban_client,
        mailer,
    ));

    let removed = service_context.auth_service.cleanup_expired_sessions().await?;
    if removed > 0 {
        tracing::info!("Removed {} expired sessions", removed);
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(service_context, Arc::new(settings));
    let service = app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(service)).await?;

    Ok(())
}
