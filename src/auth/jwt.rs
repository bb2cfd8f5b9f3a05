// src/auth/jwt.rs

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{LumenError, LumenResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub username: String,
    pub kind: TokenKind,
    pub exp: usize, // expiration timestamp
    pub iat: usize, // issued at timestamp
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

pub fn create_token(
    secret: &str,
    user_id: &str,
    username: &str,
    kind: TokenKind,
    lifetime_days: i64,
) -> LumenResult<String> {
    let now = chrono::Utc::now();
    let expiration = now
        .checked_add_signed(chrono::Duration::days(lifetime_days))
        .ok_or_else(|| LumenError::internal("failed to calculate token expiration"))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        kind,
        exp: expiration,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| LumenError::internal(format!("failed to create token: {e}")))
}

pub fn verify_token(secret: &str, token: &str, expected: TokenKind) -> LumenResult<Claims> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| LumenError::auth(format!("invalid token: {e}")))?;

    if claims.kind != expected {
        return Err(LumenError::auth("wrong token kind for this operation"));
    }

    Ok(claims)
}
