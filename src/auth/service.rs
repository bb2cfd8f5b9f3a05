// src/auth/service.rs
// User accounts: registration, login, token refresh

use std::sync::Arc;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{LumenError, LumenResult};
use crate::memory::store::{fmt_ts, parse_ts};

use super::audit::AuditLogger;
use super::jwt::{TokenKind, create_token, verify_token};
use super::models::{AuthTokens, User, UserWithPassword};
use super::password::{hash_password, verify_password};

pub struct AuthService {
    db: SqlitePool,
    audit: Arc<AuditLogger>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: SqlitePool, audit: Arc<AuditLogger>, config: AuthConfig) -> Self {
        Self { db, audit, config }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        ip: Option<&str>,
    ) -> LumenResult<AuthTokens> {
        if username.trim().is_empty() {
            return Err(LumenError::validation("username must not be empty"));
        }
        if password.len() < 8 {
            return Err(LumenError::validation("password must be at least 8 characters"));
        }
        if self.username_exists(username).await? {
            return Err(LumenError::conflict("username already exists"));
        }

        let user_id = Uuid::new_v4().to_string();
        let password_hash = hash_password(password)?;
        let now = fmt_ts(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(&user_id)
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;

        self.audit
            .log(&user_id, "user_registered", None, None, ip, username)
            .await?;

        let user = self.get_user(&user_id).await?;
        self.issue_tokens(user)
    }

    pub async fn login(&self, username: &str, password: &str, ip: Option<&str>) -> LumenResult<AuthTokens> {
        let found = self.get_user_by_username(username).await;

        let user = match found {
            Ok(u) => u,
            Err(_) => {
                self.audit
                    .log("unknown", "login_failed", None, None, ip, username)
                    .await?;
                return Err(LumenError::auth("invalid credentials"));
            }
        };

        if !user.user.is_active {
            self.audit
                .log(&user.user.id, "login_failed", None, None, ip, "account disabled")
                .await?;
            return Err(LumenError::auth("user account is disabled"));
        }

        if !verify_password(password, &user.password_hash)? {
            self.audit
                .log(&user.user.id, "login_failed", None, None, ip, "bad password")
                .await?;
            return Err(LumenError::auth("invalid credentials"));
        }

        let now = fmt_ts(Utc::now());
        sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(&user.user.id)
            .execute(&self.db)
            .await?;

        self.audit
            .log(&user.user.id, "login", None, None, ip, username)
            .await?;

        self.issue_tokens(user.user)
    }

    /// Exchange a refresh token for a fresh token pair.
    pub async fn refresh(&self, refresh_token: &str) -> LumenResult<AuthTokens> {
        let claims = verify_token(&self.config.jwt_secret, refresh_token, TokenKind::Refresh)?;
        let user = self.verify_user(&claims.sub).await?;
        self.issue_tokens(user)
    }

    /// Resolve a bearer access token to an active user.
    pub async fn authenticate(&self, access_token: &str) -> LumenResult<User> {
        let claims = verify_token(&self.config.jwt_secret, access_token, TokenKind::Access)?;
        self.verify_user(&claims.sub).await
    }

    pub async fn verify_user(&self, user_id: &str) -> LumenResult<User> {
        let user = self.get_user(user_id).await?;
        if !user.is_active {
            return Err(LumenError::auth("user account is disabled"));
        }
        Ok(user)
    }

    fn issue_tokens(&self, user: User) -> LumenResult<AuthTokens> {
        let access_token = create_token(
            &self.config.jwt_secret,
            &user.id,
            &user.username,
            TokenKind::Access,
            self.config.access_token_days,
        )?;
        let refresh_token = create_token(
            &self.config.jwt_secret,
            &user.id,
            &user.username,
            TokenKind::Refresh,
            self.config.refresh_token_days,
        )?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            user,
        })
    }

    async fn get_user(&self, user_id: &str) -> LumenResult<User> {
        let row = sqlx::query(
            "SELECT id, username, email, created_at, is_active FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| LumenError::not_found("user not found"))?;

        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
            is_active: row.get::<i64, _>("is_active") != 0,
        })
    }

    async fn get_user_by_username(&self, username: &str) -> LumenResult<UserWithPassword> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, created_at, is_active FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| LumenError::auth("invalid credentials"))?;

        Ok(UserWithPassword {
            user: User {
                id: row.get("id"),
                username: row.get("username"),
                email: row.get("email"),
                created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
                is_active: row.get::<i64, _>("is_active") != 0,
            },
            password_hash: row.get("password_hash"),
        })
    }

    async fn username_exists(&self, username: &str) -> LumenResult<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.db)
            .await?;
        Ok(count.0 > 0)
    }
}
