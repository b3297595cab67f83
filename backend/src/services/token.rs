//! Access/refresh pair issuance for guardians and staff.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::{
    config::Config,
    error::AppError,
    models::{
        account::{claims_of, Identity},
        auth::{AuthenticatedResponse, TokenPairResponse},
        refresh_token::NewRefreshToken,
    },
    repositories::{
        refresh_token as refresh_repo,
        transaction::{begin_transaction, commit_transaction},
    },
    services::identity,
    types::RefreshTokenId,
    utils::{
        client::ClientMeta,
        jwt::{self, Claims, IssuedAccessToken},
    },
};

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedAccessToken,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn into_response(self, now: DateTime<Utc>) -> TokenPairResponse {
        TokenPairResponse {
            expires_in: (self.access.expires_at.timestamp() - now.timestamp()).max(0),
            access_token: self.access.token,
            refresh_token: self.refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            access_token_expires_at: self.access.expires_at,
            refresh_token_expires_at: self.refresh_expires_at,
        }
    }
}

/// Signs an access token for a person with its role-specific claims.
pub fn issue_access_token(
    config: &Config,
    identity: &Identity,
    now: DateTime<Utc>,
) -> anyhow::Result<IssuedAccessToken> {
    let claims = Claims::new(
        identity.subject_id(),
        identity.role(),
        claims_of(identity),
        config,
        now,
        config.access_token_ttl(),
    );
    jwt::sign_access_token(&claims, &config.jwt_secret)
}

/// Issues a new pair and stores the refresh token (hashed) paired with the
/// access token's `jti`.
pub async fn issue_token_pair(
    conn: &mut PgConnection,
    config: &Config,
    identity: &Identity,
    client: &ClientMeta,
    now: DateTime<Utc>,
) -> Result<TokenPair, AppError> {
    let access = issue_access_token(config, identity, now)?;
    let refresh_token = jwt::generate_refresh_token();
    let token_hash = jwt::hash_refresh_token(&refresh_token);
    let subject_id = identity.subject_id();
    let refresh_expires_at = now + config.refresh_token_ttl();

    refresh_repo::insert_refresh_token(
        &mut *conn,
        &NewRefreshToken {
            id: RefreshTokenId::new(),
            token_hash: &token_hash,
            jwt_id: &access.jti,
            subject_id: &subject_id,
            role: identity.role(),
            client_ip: client.ip.as_deref(),
            user_agent: client.user_agent.as_deref(),
            created_at: now,
            expires_at: refresh_expires_at,
        },
    )
    .await?;

    Ok(TokenPair {
        access,
        refresh_token,
        refresh_expires_at,
    })
}

/// Issues tokens for a login and stamps the account's last login.
pub async fn authenticate(
    pool: &PgPool,
    config: &Config,
    identity: &Identity,
    client: &ClientMeta,
    now: DateTime<Utc>,
) -> Result<AuthenticatedResponse, AppError> {
    let mut tx = begin_transaction(pool).await?;
    let pair = issue_token_pair(&mut tx, config, identity, client, now).await?;
    identity::record_login(&mut *tx, identity, now).await?;
    commit_transaction(tx).await?;

    tracing::info!(
        subject_id = %identity.subject_id(),
        role = %identity.role(),
        "Issued token pair"
    );

    Ok(AuthenticatedResponse {
        tokens: pair.into_response(now),
        profile: identity.profile(),
    })
}
