pub mod client;
pub mod jwt;
pub mod otp_code;
pub mod password;
