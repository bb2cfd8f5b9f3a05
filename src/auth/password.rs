// src/auth/password.rs

use bcrypt::{BcryptError, DEFAULT_COST, hash, verify};

use crate::error::{LumenError, LumenResult};

pub fn hash_password(password: &str) -> LumenResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e: BcryptError| LumenError::internal(format!("failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> LumenResult<bool> {
    verify(password, hash)
        .map_err(|e: BcryptError| LumenError::internal(format!("failed to verify password: {e}")))
}
