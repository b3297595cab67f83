use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::OnceLock;

/// Minimum length accepted when an operator sets a kiosk password.
pub const MIN_KIOSK_PASSWORD_LENGTH: usize = 12;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification error: {}", e)),
    }
}

/// Runs a verification against a throwaway hash so that unknown login ids
/// cost the same as a wrong password.
pub fn burn_password_check(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY_HASH.get_or_init(|| hash_password("kiosk-dummy-password").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}

pub fn validate_kiosk_password(password: &str) -> anyhow::Result<()> {
    if password.chars().count() < MIN_KIOSK_PASSWORD_LENGTH {
        anyhow::bail!(
            "Kiosk password must be at least {} characters",
            MIN_KIOSK_PASSWORD_LENGTH
        );
    }
    if password.trim() != password {
        anyhow::bail!("Kiosk password must not start or end with whitespace");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("front-desk-2024").expect("hash should succeed");
        assert!(verify_password("front-desk-2024", &hash).unwrap());
        assert!(!verify_password("front-desk-2025", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn kiosk_password_rules() {
        assert!(validate_kiosk_password("short").is_err());
        assert!(validate_kiosk_password(" padded-password ").is_err());
        assert!(validate_kiosk_password("long-enough-password").is_ok());
    }
}
