//! Persisted refresh tokens.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::{models::account::Role, types::RefreshTokenId};

#[derive(Debug, Clone, FromRow)]
/// One link of a rotation chain. Rows are never deleted; rotation revokes
/// the consumed row and inserts the next one.
pub struct StoredRefreshToken {
    pub id: RefreshTokenId,
    /// SHA-256 of the opaque token value handed to the client.
    pub token_hash: String,
    /// `jti` of the access token issued alongside this refresh token.
    pub jwt_id: String,
    pub subject_id: String,
    pub role: Role,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl StoredRefreshToken {
    /// Unrevoked and not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

#[derive(Debug)]
pub struct NewRefreshToken<'a> {
    pub id: RefreshTokenId,
    pub token_hash: &'a str,
    pub jwt_id: &'a str,
    pub subject_id: &'a str,
    pub role: Role,
    pub client_ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(is_revoked: bool, expires_in: Duration) -> StoredRefreshToken {
        let now = Utc::now();
        StoredRefreshToken {
            id: RefreshTokenId::new(),
            token_hash: "hash".into(),
            jwt_id: "jti".into(),
            subject_id: "subject".into(),
            role: Role::Guardian,
            client_ip: None,
            user_agent: None,
            created_at: now,
            expires_at: now + expires_in,
            is_revoked,
            revoked_at: None,
        }
    }

    #[test]
    fn live_requires_unrevoked_and_unexpired() {
        let now = Utc::now();
        assert!(token(false, Duration::days(1)).is_live(now));
        assert!(!token(true, Duration::days(1)).is_live(now));
        assert!(!token(false, Duration::seconds(-1)).is_live(now));
    }
}
