//! Data models shared across database access and API handlers.

pub mod account;
pub mod auth;
pub mod kiosk;
pub mod otp_challenge;
pub mod phone;
pub mod refresh_token;
pub mod role_preference;
