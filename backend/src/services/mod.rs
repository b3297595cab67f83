pub mod identity;
pub mod kiosk;
pub mod login;
pub mod otp;
pub mod refresh;
pub mod sms;
pub mod token;
