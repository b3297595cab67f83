//! Sets (or resets) the kiosk credentials of one nursery.
//!
//! Usage: `set_kiosk_password <nursery-id> <login-id>`. The password is read
//! from `KIOSK_PASSWORD` when set, otherwise from the first line of stdin.

use std::io::BufRead;

use nursery_auth::{
    config::Config,
    db::connection::create_pool,
    repositories::kiosk,
    types::NurseryId,
    utils::password::{hash_password, validate_kiosk_password},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "set_kiosk_password=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(nursery_id), Some(login_id)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: set_kiosk_password <nursery-id> <login-id>");
    };
    let nursery_id: NurseryId = nursery_id
        .parse()
        .map_err(|_| anyhow::anyhow!("nursery id must be a UUID"))?;
    let login_id = login_id.trim();
    if login_id.is_empty() {
        anyhow::bail!("login id must not be empty");
    }

    let password = read_password()?;
    validate_kiosk_password(&password)?;
    let password_hash = hash_password(&password)?;

    let config = Config::load()?;
    let pool = create_pool(&config).await?;
    let updated = kiosk::set_credentials(&pool, nursery_id, login_id, &password_hash).await?;
    if updated == 0 {
        anyhow::bail!("no nursery with id {nursery_id}");
    }

    tracing::info!(%nursery_id, login_id, "Kiosk credentials updated; lock state reset");
    Ok(())
}

fn read_password() -> anyhow::Result<String> {
    if let Ok(password) = std::env::var("KIOSK_PASSWORD") {
        return Ok(password);
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
