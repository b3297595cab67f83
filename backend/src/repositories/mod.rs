//! Database access, one module per table family.

pub mod account;
pub mod kiosk;
pub mod otp_challenge;
pub mod refresh_token;
pub mod role_preference;
pub mod transaction;
pub mod verified_phone;
