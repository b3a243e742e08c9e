//! Utility functions for the queueing service

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

/// Number of characters in an OTP ticket code
pub const OTP_LEN: usize = 6;

/// Number of characters in a company code
pub const COMPANY_CODE_LEN: usize = 6;

/// Generate a new unique entity ID
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Generate a 6-digit numeric OTP candidate from the thread CSPRNG.
/// Uniqueness against existing tickets is the caller's job.
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    (0..OTP_LEN)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Generate a 6-uppercase-letter company code candidate.
pub fn generate_company_code() -> String {
    let mut rng = rand::rng();
    (0..COMPANY_CODE_LEN)
        .map(|_| char::from(b'A' + rng.random_range(0..26u8)))
        .collect()
}

/// Check that a string is a well-formed OTP (exactly 6 ASCII digits).
pub fn is_valid_otp(otp: &str) -> bool {
    otp.len() == OTP_LEN && otp.bytes().all(|b| b.is_ascii_digit())
}

/// Check that a string is a well-formed company code (exactly 6 uppercase
/// ASCII letters).
pub fn is_valid_company_code(code: &str) -> bool {
    code.len() == COMPANY_CODE_LEN && code.bytes().all(|b| b.is_ascii_uppercase())
}
