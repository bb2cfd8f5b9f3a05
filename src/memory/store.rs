// src/memory/store.rs
// ChatMemoryStore - durable persistence for sessions, messages, summaries,
// document chunks, and message embeddings (chat_memory.db)

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::MemoryConfig;
use crate::error::{LumenError, LumenResult};

use super::summary::build_digest;
use super::types::{
    ChatSession, ChunkHit, ConversationEvent, ConversationSummary, DocumentChunk, MemoryAnalytics,
    MessageRole, ModelUsage, StoredMessage,
};

/// Candidate row handed to the semantic index: an embedded message plus the
/// vector it was indexed with.
#[derive(Debug, Clone)]
pub struct EmbeddedMessage {
    pub message_id: i64,
    pub session_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub embedding: Vec<f32>,
}

/// The relational store of record for chat memory.
///
/// Writes serialize through `write_lock`; reads go straight to the pool.
/// The database runs in WAL mode so readers never block on the writer.
pub struct ChatMemoryStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
    config: MemoryConfig,
}

pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    // Fixed-width so lexicographic ORDER BY matches chronological order
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::UNIX_EPOCH)
}

fn join_models(models: &BTreeSet<String>) -> Option<String> {
    if models.is_empty() {
        None
    } else {
        Some(models.iter().cloned().collect::<Vec<_>>().join(","))
    }
}

fn split_models(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .filter(|m| !m.is_empty())
            .map(|m| m.to_string())
            .collect()
    })
    .unwrap_or_default()
}

impl ChatMemoryStore {
    /// Open (or create) the database file in WAL mode.
    pub async fn open(path: &std::path::Path, config: MemoryConfig) -> LumenResult<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| LumenError::internal(format!("invalid database path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.sqlite_max_connections)
            .connect_with(options)
            .await?;

        super::schema::init(&pool)
            .await
            .map_err(|e| LumenError::internal(format!("chat memory schema init failed: {e}")))?;

        info!("Chat memory store opened at {}", path.display());
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
            config,
        })
    }

    /// In-memory store for tests.
    pub async fn in_memory(config: MemoryConfig) -> LumenResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;
        super::schema::init(&pool)
            .await
            .map_err(|e| LumenError::internal(format!("chat memory schema init failed: {e}")))?;
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
            config,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =====================================
    // SESSIONS
    // =====================================

    pub async fn create_session(
        &self,
        owner_user_id: &str,
        title: &str,
        default_model: &str,
        team_id: Option<&str>,
    ) -> LumenResult<ChatSession> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO chat_sessions
                (id, title, owner_user_id, team_id, created_at, updated_at,
                 default_model, message_count, models_used, auto_titled)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, 0)
            "#,
        )
        .bind(&id)
        .bind(title)
        .bind(owner_user_id)
        .bind(team_id)
        .bind(fmt_ts(now))
        .bind(fmt_ts(now))
        .bind(default_model)
        .execute(&self.pool)
        .await?;

        info!("Created chat session {id}");
        Ok(ChatSession {
            id,
            title: title.to_string(),
            owner_user_id: owner_user_id.to_string(),
            team_id: team_id.map(|t| t.to_string()),
            created_at: now,
            updated_at: now,
            default_model: default_model.to_string(),
            message_count: 0,
            models_used: Vec::new(),
            summary: None,
            auto_titled: false,
        })
    }

    pub async fn get_session(&self, session_id: &str) -> LumenResult<Option<ChatSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, owner_user_id, team_id, created_at, updated_at,
                   default_model, message_count, models_used, summary, auto_titled
            FROM chat_sessions WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ChatSession {
            id: row.get("id"),
            title: row.get("title"),
            owner_user_id: row.get("owner_user_id"),
            team_id: row.get("team_id"),
            created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
            updated_at: parse_ts(row.get::<String, _>("updated_at").as_str()),
            default_model: row.get("default_model"),
            message_count: row.get("message_count"),
            models_used: split_models(row.get("models_used")),
            summary: row.get("summary"),
            auto_titled: row.get::<i64, _>("auto_titled") != 0,
        }))
    }

    pub async fn list_sessions(&self, owner_user_id: &str) -> LumenResult<Vec<ChatSession>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, owner_user_id, team_id, created_at, updated_at,
                   default_model, message_count, models_used, summary, auto_titled
            FROM chat_sessions
            WHERE owner_user_id = ?
            ORDER BY updated_at DESC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ChatSession {
                id: row.get("id"),
                title: row.get("title"),
                owner_user_id: row.get("owner_user_id"),
                team_id: row.get("team_id"),
                created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
                updated_at: parse_ts(row.get::<String, _>("updated_at").as_str()),
                default_model: row.get("default_model"),
                message_count: row.get("message_count"),
                models_used: split_models(row.get("models_used")),
                summary: row.get("summary"),
                auto_titled: row.get::<i64, _>("auto_titled") != 0,
            })
            .collect())
    }

    pub async fn update_session_title(
        &self,
        session_id: &str,
        title: &str,
        auto_titled: bool,
    ) -> LumenResult<()> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("UPDATE chat_sessions SET title = ?, auto_titled = ? WHERE id = ?")
            .bind(title)
            .bind(auto_titled as i64)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LumenError::not_found(format!("session {session_id}")));
        }
        Ok(())
    }

    /// Delete a session and everything it owns.
    pub async fn delete_session(&self, session_id: &str) -> LumenResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM message_embeddings WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM document_chunks WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversation_summaries WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Deleted chat session {session_id}");
        Ok(())
    }

    // =====================================
    // MESSAGES
    // =====================================

    /// Append a message. In one transaction: insert the row, bump the
    /// session's `updated_at` and `message_count`, and fold the event's
    /// model into `models_used`. The rolling summary is refreshed under the
    /// same writer guard before this returns.
    pub async fn append_message(
        &self,
        session_id: &str,
        event: &ConversationEvent,
    ) -> LumenResult<i64> {
        let files_json = event
            .files
            .as_ref()
            .map(|f| serde_json::to_string(f).unwrap_or_default());

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let models_used: Option<String> =
            sqlx::query_scalar("SELECT models_used FROM chat_sessions WHERE id = ?")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| LumenError::not_found(format!("session {session_id}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO chat_messages
                (session_id, timestamp, role, content, model, tokens, files_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(fmt_ts(event.timestamp))
        .bind(event.role.as_str())
        .bind(&event.content)
        .bind(&event.model)
        .bind(event.tokens)
        .bind(&files_json)
        .execute(&mut *tx)
        .await?;
        let message_id = result.last_insert_rowid();

        let mut models: BTreeSet<String> = split_models(models_used).into_iter().collect();
        if let Some(model) = &event.model {
            models.insert(model.clone());
        }

        sqlx::query(
            r#"
            UPDATE chat_sessions
            SET updated_at = ?, message_count = message_count + 1, models_used = ?
            WHERE id = ?
            "#,
        )
        .bind(fmt_ts(Utc::now()))
        .bind(join_models(&models))
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Appended message {message_id} to session {session_id}");

        self.refresh_summary_locked(session_id).await?;

        Ok(message_id)
    }

    /// Last `n` messages in chronological order.
    pub async fn get_recent_messages(
        &self,
        session_id: &str,
        n: usize,
    ) -> LumenResult<Vec<StoredMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, timestamp, role, content, model, tokens, files_json
            FROM chat_messages
            WHERE session_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<StoredMessage> =
            rows.into_iter().map(Self::row_to_message).collect::<LumenResult<_>>()?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn get_messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> LumenResult<Vec<StoredMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, timestamp, role, content, model, tokens, files_json
            FROM chat_messages
            WHERE session_id = ?
            ORDER BY timestamp ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit.map(|l| l as i64).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    fn row_to_message(row: sqlx::sqlite::SqliteRow) -> LumenResult<StoredMessage> {
        let role: String = row.get("role");
        let files_json: Option<String> = row.get("files_json");

        Ok(StoredMessage {
            id: row.get("id"),
            session_id: row.get("session_id"),
            event: ConversationEvent {
                timestamp: parse_ts(row.get::<String, _>("timestamp").as_str()),
                role: role.parse::<MessageRole>()?,
                content: row.get("content"),
                model: row.get("model"),
                tokens: row.get("tokens"),
                files: files_json.and_then(|f| serde_json::from_str(&f).ok()),
            },
        })
    }

    // =====================================
    // ROLLING SUMMARY
    // =====================================

    /// Rebuild the rolling summary from the latest events and persist it
    /// together with the events snapshot and models union, mirroring the
    /// text onto the session row. One row per session.
    pub async fn upsert_summary(&self, session_id: &str) -> LumenResult<()> {
        let _guard = self.write_lock.lock().await;
        self.refresh_summary_locked(session_id).await
    }

    async fn refresh_summary_locked(&self, session_id: &str) -> LumenResult<()> {
        let events: Vec<ConversationEvent> = self
            .get_recent_messages(session_id, self.config.summary_max_events)
            .await?
            .into_iter()
            .map(|m| m.event)
            .collect();

        if events.is_empty() {
            return Ok(());
        }

        let digest = build_digest(&events, self.config.summary_max_chars);
        let models: BTreeSet<String> = events.iter().filter_map(|e| e.model.clone()).collect();
        let events_json = serde_json::to_string(&events)
            .map_err(|e| LumenError::internal(format!("summary snapshot serialization: {e}")))?;
        let now = fmt_ts(Utc::now());

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO conversation_summaries
                (session_id, created_at, updated_at, summary, events_json, models_used)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                updated_at = excluded.updated_at,
                summary = excluded.summary,
                events_json = excluded.events_json,
                models_used = excluded.models_used
            "#,
        )
        .bind(session_id)
        .bind(&now)
        .bind(&now)
        .bind(&digest)
        .bind(&events_json)
        .bind(join_models(&models))
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE chat_sessions SET summary = ? WHERE id = ?")
            .bind(&digest)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_summary(&self, session_id: &str) -> LumenResult<Option<ConversationSummary>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, created_at, updated_at, summary, models_used
            FROM conversation_summaries
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ConversationSummary {
            session_id: row.get("session_id"),
            created_at: parse_ts(row.get::<String, _>("created_at").as_str()),
            updated_at: parse_ts(row.get::<String, _>("updated_at").as_str()),
            summary: row.get("summary"),
            models_used: split_models(row.get("models_used")),
        }))
    }

    // =====================================
    // DOCUMENT CHUNKS (RAG)
    // =====================================

    /// Bulk insert the chunks of an uploaded document. All chunks of a file
    /// carry the same file_id and a contiguous 0..total_chunks index range.
    pub async fn store_document_chunks(
        &self,
        session_id: &str,
        chunks: &[DocumentChunk],
    ) -> LumenResult<()> {
        let now = fmt_ts(Utc::now());

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            let embedding_json = serde_json::to_string(&chunk.embedding)
                .map_err(|e| LumenError::internal(format!("chunk embedding serialization: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO document_chunks
                    (session_id, file_id, filename, chunk_index, total_chunks,
                     content, embedding_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session_id)
            .bind(&chunk.file_id)
            .bind(&chunk.filename)
            .bind(chunk.chunk_index)
            .bind(chunk.total_chunks)
            .bind(&chunk.content)
            .bind(&embedding_json)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Stored {} chunks for session {session_id}", chunks.len());
        Ok(())
    }

    /// Top-k chunks of one session by similarity to the query vector.
    pub async fn search_document_chunks(
        &self,
        session_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> LumenResult<Vec<ChunkHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_id, filename, chunk_index, content, embedding_json
            FROM document_chunks
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<ChunkHit> = rows
            .into_iter()
            .filter_map(|row| {
                let embedding_json: String = row.get("embedding_json");
                let embedding: Vec<f32> = serde_json::from_str(&embedding_json).ok()?;
                Some(ChunkHit {
                    id: row.get("id"),
                    file_id: row.get("file_id"),
                    filename: row.get("filename"),
                    chunk_index: row.get("chunk_index"),
                    content: row.get("content"),
                    similarity: crate::embedding::cosine_similarity(query_vector, &embedding),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        Ok(hits)
    }

    // =====================================
    // MESSAGE EMBEDDINGS
    // =====================================

    /// Idempotent per message_id.
    pub async fn store_message_embedding(
        &self,
        message_id: i64,
        session_id: &str,
        vector: &[f32],
    ) -> LumenResult<()> {
        let embedding_json = serde_json::to_string(vector)
            .map_err(|e| LumenError::internal(format!("embedding serialization: {e}")))?;

        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO message_embeddings (message_id, session_id, embedding_json, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(message_id) DO UPDATE SET
                embedding_json = excluded.embedding_json
            "#,
        )
        .bind(message_id)
        .bind(session_id)
        .bind(&embedding_json)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent embedded messages across all sessions owned by a user.
    /// This is the candidate set the semantic index scores.
    pub async fn recent_embedded_messages(
        &self,
        owner_user_id: &str,
        limit: usize,
    ) -> LumenResult<Vec<EmbeddedMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.session_id, m.content, m.timestamp, e.embedding_json
            FROM chat_messages m
            JOIN message_embeddings e ON e.message_id = m.id
            JOIN chat_sessions s ON s.id = m.session_id
            WHERE s.owner_user_id = ?
            ORDER BY m.timestamp DESC, m.id DESC
            LIMIT ?
            "#,
        )
        .bind(owner_user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let embedding_json: String = row.get("embedding_json");
                let embedding: Vec<f32> = serde_json::from_str(&embedding_json).ok()?;
                Some(EmbeddedMessage {
                    message_id: row.get("id"),
                    session_id: row.get("session_id"),
                    content: row.get("content"),
                    timestamp: parse_ts(row.get::<String, _>("timestamp").as_str()),
                    embedding,
                })
            })
            .collect())
    }

    // =====================================
    // ANALYTICS
    // =====================================

    pub async fn analytics(&self, session_id: Option<&str>) -> LumenResult<MemoryAnalytics> {
        let (sessions, messages, tokens): (i64, i64, Option<i64>) = match session_id {
            Some(id) => {
                let row = sqlx::query(
                    "SELECT COUNT(*) AS msgs, SUM(tokens) AS toks FROM chat_messages WHERE session_id = ?",
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
                (1, row.get("msgs"), row.get("toks"))
            }
            None => {
                let row = sqlx::query(
                    r#"
                    SELECT COUNT(DISTINCT session_id) AS sessions,
                           COUNT(*) AS msgs,
                           SUM(tokens) AS toks
                    FROM chat_messages
                    "#,
                )
                .fetch_one(&self.pool)
                .await?;
                (row.get("sessions"), row.get("msgs"), row.get("toks"))
            }
        };

        let usage_rows = sqlx::query(
            r#"
            SELECT model, COUNT(*) AS count
            FROM chat_messages
            WHERE model IS NOT NULL
            GROUP BY model
            ORDER BY count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(MemoryAnalytics {
            total_sessions: sessions,
            total_messages: messages,
            total_tokens: tokens.unwrap_or(0),
            model_usage: usage_rows
                .into_iter()
                .map(|row| ModelUsage {
                    model: row.get("model"),
                    count: row.get("count"),
                })
                .collect(),
        })
    }
}
