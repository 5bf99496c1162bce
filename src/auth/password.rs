//! Password credentials. bcrypt embeds a fresh random salt in every hash
//! and compares in constant time, so equal passwords never share a stored
//! credential and verification leaks nothing about where a mismatch occurs.

use crate::error::{AppError, AppResult};

pub fn hash_password(plain: &str) -> AppResult<String> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Returns false for a wrong password and for a malformed stored hash.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}
