use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nursery_auth::{config::Config, db::connection::create_pool, repositories::verified_phone};

// Code and refresh rows stay: they back the rolling quotas and the reuse detection.
const VACUUM_TABLES: [&str; 3] = ["verified_phone_markers", "otp_challenges", "refresh_tokens"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_maintenance=info,nursery_auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config).await?;

    // Markers are useless once the selection window has passed.
    let cutoff = Utc::now() - config.role_selection_ttl();
    let deleted_markers = verified_phone::prune_markers(&pool, cutoff).await?;
    if deleted_markers > 0 {
        tracing::info!("Deleted {} stale verified-phone markers", deleted_markers);
    }

    for table in VACUUM_TABLES {
        sqlx::query(&format!("VACUUM (ANALYZE) {table}"))
            .execute(&pool)
            .await?;
        tracing::debug!(table, "Vacuumed");
    }

    Ok(())
}
