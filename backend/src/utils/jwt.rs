use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{config::Config, models::account::Role};

const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub jti: String, // pairs the token with its refresh token
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// Time of the original password login; carried across kiosk heartbeats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Claims {
    pub fn new(
        subject: String,
        role: Role,
        extra: BTreeMap<String, String>,
        config: &Config,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            sub: subject,
            role,
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + lifetime).timestamp(),
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
            auth_time: None,
            extra,
        }
    }

    pub fn with_auth_time(mut self, auth_time: i64) -> Self {
        self.auth_time = Some(auth_time);
        self
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone)]
/// A freshly signed access token and the values the caller needs to persist or report.
pub struct IssuedAccessToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

pub fn sign_access_token(claims: &Claims, secret: &str) -> anyhow::Result<IssuedAccessToken> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(IssuedAccessToken {
        token,
        jti: claims.jti.clone(),
        expires_at: claims.expires_at(),
    })
}

fn validation(config: &Config) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[config.jwt_issuer.as_str()]);
    validation.set_audience(&[config.jwt_audience.as_str()]);
    validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
    validation
}

/// Full validation: signature, issuer, audience and expiry.
pub fn verify_access_token(token: &str, config: &Config) -> anyhow::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &validation(config),
    )?;

    Ok(token_data.claims)
}

/// Same as [`verify_access_token`] except an elapsed `exp` is accepted.
///
/// Used by refresh rotation (the access token is expected to be stale) and
/// by the kiosk heartbeat. Signature, issuer and audience are still enforced.
pub fn decode_access_token_ignoring_expiry(token: &str, config: &Config) -> anyhow::Result<Claims> {
    let mut validation = validation(config);
    validation.validate_exp = false;
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Opaque refresh token value: 256 random bits, URL-safe base64.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Lookup key stored in place of the refresh token value.
pub fn hash_refresh_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}
