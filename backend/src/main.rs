use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nursery_auth::{
    config::Config,
    db::connection::{create_pool, DbPool},
    services::sms::sender_from_config,
    state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nursery_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        jwt_secret = %mask_secret(&config.jwt_secret),
        otp_hash_key = %mask_secret(&config.otp_hash_key),
        access_token_expiration_hours = config.access_token_expiration_hours,
        refresh_token_expiration_days = config.refresh_token_expiration_days,
        otp_daily_send_limit = config.otp_daily_send_limit,
        sms_configured = config.sms_api_url.is_some(),
        development_mode = config.development_mode,
        production_mode = config.production_mode,
        "Loaded configuration from environment/.env"
    );
    if config.development_mode {
        tracing::warn!("DEVELOPMENT_MODE is on: daily code quota disabled and codes are logged");
    }

    let pool: DbPool = create_pool(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let sms_sender = sender_from_config(&config)?;
    let port = config.server_port;
    let app = nursery_auth::app(AppState::new(pool, config, sms_sender))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
