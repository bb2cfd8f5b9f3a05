// src/auth/vault.rs
// Encrypted per-team vault. Content is AES-256-GCM encrypted at rest with
// a team-scoped key; deletion is soft.

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{LumenError, LumenResult};
use crate::memory::store::{fmt_ts, parse_ts};

use super::audit::AuditLogger;
use super::models::VaultItem;

const NONCE_LEN: usize = 12;

/// Derive the team-scoped encryption key. A real deployment would source
/// this from a KMS; key derivation from the team id keeps items decryptable
/// across restarts without extra key storage.
fn team_key(team_id: &str) -> Key<Aes256Gcm> {
    let mut hasher = Sha256::new();
    hasher.update(b"lumen_vault_");
    hasher.update(team_id.as_bytes());
    let digest = hasher.finalize();
    *Key::<Aes256Gcm>::from_slice(&digest)
}

fn key_hash(key: &Key<Aes256Gcm>) -> String {
    hex::encode(Sha256::digest(key))
}

/// Encrypt to base64( nonce || ciphertext ).
fn encrypt_content(content: &str, team_id: &str) -> LumenResult<(String, String)> {
    let key = team_key(team_id);
    let cipher = Aes256Gcm::new(&key);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, content.as_bytes())
        .map_err(|e| LumenError::internal(format!("vault encryption failed: {e}")))?;

    let mut combined = nonce.to_vec();
    combined.extend_from_slice(&ciphertext);

    Ok((BASE64.encode(combined), key_hash(&key)))
}

fn decrypt_content(encoded: &str, team_id: &str) -> LumenResult<String> {
    let combined = BASE64
        .decode(encoded)
        .map_err(|e| LumenError::internal(format!("vault ciphertext is not valid base64: {e}")))?;

    if combined.len() < NONCE_LEN {
        return Err(LumenError::internal("vault ciphertext too short"));
    }
    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);

    let key = team_key(team_id);
    let cipher = Aes256Gcm::new(&key);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| LumenError::internal(format!("vault decryption failed: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| LumenError::internal(format!("vault plaintext is not UTF-8: {e}")))
}

pub struct VaultService {
    db: SqlitePool,
    audit: Arc<AuditLogger>,
}

impl VaultService {
    pub fn new(db: SqlitePool, audit: Arc<AuditLogger>) -> Self {
        Self { db, audit }
    }

    pub async fn create_item(
        &self,
        team_id: &str,
        name: &str,
        item_type: &str,
        content: &str,
        created_by: &str,
        mime_type: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> LumenResult<String> {
        if name.trim().is_empty() {
            return Err(LumenError::validation("vault item name must not be empty"));
        }

        let item_id = Uuid::new_v4().to_string();
        let (ciphertext, key_hash) = encrypt_content(content, team_id)?;
        let metadata_json = metadata.map(|m| m.to_string());

        sqlx::query(
            r#"
            INSERT INTO vault_items
                (item_id, team_id, item_name, item_type, ciphertext, key_hash,
                 size, mime_type, created_at, created_by, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item_id)
        .bind(team_id)
        .bind(name)
        .bind(item_type)
        .bind(&ciphertext)
        .bind(&key_hash)
        .bind(content.len() as i64)
        .bind(mime_type)
        .bind(fmt_ts(Utc::now()))
        .bind(created_by)
        .bind(&metadata_json)
        .execute(&self.db)
        .await?;

        self.audit
            .log(created_by, "vault_item_created", Some("vault"), Some(&item_id), None, name)
            .await?;

        info!("Vault item {item_id} created in team {team_id}");
        Ok(item_id)
    }

    pub async fn get_item(&self, team_id: &str, item_id: &str) -> LumenResult<Option<VaultItem>> {
        let row = sqlx::query(
            r#"
            SELECT item_id, team_id, item_name, item_type, size, mime_type,
                   created_at, created_by, updated_at, updated_by, is_deleted, metadata
            FROM vault_items
            WHERE team_id = ? AND item_id = ? AND is_deleted = 0
            "#,
        )
        .bind(team_id)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Self::row_to_item))
    }

    /// Decrypt an item's content. Callers must have cleared the `read`
    /// permission first.
    pub async fn read_content(
        &self,
        team_id: &str,
        item_id: &str,
        read_by: &str,
    ) -> LumenResult<String> {
        let row = sqlx::query(
            "SELECT ciphertext FROM vault_items WHERE team_id = ? AND item_id = ? AND is_deleted = 0",
        )
        .bind(team_id)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| LumenError::not_found(format!("vault item {item_id}")))?;

        let ciphertext: String = row.get("ciphertext");
        let content = decrypt_content(&ciphertext, team_id)?;

        self.audit
            .log(read_by, "vault_item_read", Some("vault"), Some(item_id), None, "")
            .await?;

        Ok(content)
    }

    pub async fn update_item(
        &self,
        team_id: &str,
        item_id: &str,
        content: &str,
        updated_by: &str,
    ) -> LumenResult<()> {
        let (ciphertext, key_hash) = encrypt_content(content, team_id)?;

        let result = sqlx::query(
            r#"
            UPDATE vault_items
            SET ciphertext = ?, key_hash = ?, size = ?, updated_at = ?, updated_by = ?
            WHERE team_id = ? AND item_id = ? AND is_deleted = 0
            "#,
        )
        .bind(&ciphertext)
        .bind(&key_hash)
        .bind(content.len() as i64)
        .bind(fmt_ts(Utc::now()))
        .bind(updated_by)
        .bind(team_id)
        .bind(item_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::not_found(format!("vault item {item_id}")));
        }

        self.audit
            .log(updated_by, "vault_item_updated", Some("vault"), Some(item_id), None, "")
            .await?;
        Ok(())
    }

    /// Soft delete. Undeletion is not supported.
    pub async fn delete_item(
        &self,
        team_id: &str,
        item_id: &str,
        deleted_by: &str,
    ) -> LumenResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE vault_items
            SET is_deleted = 1, deleted_at = ?, deleted_by = ?
            WHERE team_id = ? AND item_id = ? AND is_deleted = 0
            "#,
        )
        .bind(fmt_ts(Utc::now()))
        .bind(deleted_by)
        .bind(team_id)
        .bind(item_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::not_found(format!("vault item {item_id}")));
        }

        self.audit
            .log(deleted_by, "vault_item_deleted", Some("vault"), Some(item_id), None, "")
            .await?;
        Ok(())
    }

    pub async fn list_items(&self, team_id: &str) -> LumenResult<Vec<VaultItem>> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, team_id, item_name, item_type, size, mime_type,
                   created_at, created_by, updated_at, updated_by, is_deleted, metadata
            FROM vault_items
            WHERE team_id = ? AND is_deleted = 0
            ORDER BY created_at DESC
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Self::row_to_item).collect())
    }

    fn row_to_item(row: sqlx::sqlite::SqliteRow) -> VaultItem {
        let metadata: Option<String> = row.get("metadata");
        VaultItem {
            item_id: row.get("item_id"),
            team_id: row.get("team_id"),
            name: row.get("item_name"),
            item_type: row.get("item_type"),
            size: row.get("size"),
            mime_type: row.get("mime_type"),
            created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
            created_by: row.get("created_by"),
            updated_at: row
                .get::<Option<String>, _>("updated_at")
                .map(|raw| parse_ts(&raw)),
            updated_by: row.get("updated_by"),
            is_deleted: row.get::<i64, _>("is_deleted") != 0,
            metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        }
    }
}
