// src/memory/schema.rs
// chat_memory.db table definitions

use anyhow::Result;
use sqlx::SqlitePool;

/// Create the chat memory tables and indexes if they don't exist.
pub async fn init(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            owner_user_id TEXT NOT NULL,
            team_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            default_model TEXT NOT NULL,
            message_count INTEGER NOT NULL DEFAULT 0,
            models_used TEXT,
            summary TEXT,
            auto_titled INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            model TEXT,
            tokens INTEGER,
            files_json TEXT,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversation_summaries (
            session_id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            summary TEXT NOT NULL,
            events_json TEXT NOT NULL,
            models_used TEXT,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            file_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS message_embeddings (
            message_id INTEGER PRIMARY KEY,
            session_id TEXT NOT NULL,
            embedding_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (message_id) REFERENCES chat_messages(id),
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_messages_session ON chat_messages(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON chat_messages(timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_chunks_session ON document_chunks(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_chunks_file ON document_chunks(file_id)",
        "CREATE INDEX IF NOT EXISTS idx_embeddings_session ON message_embeddings(session_id)",
    ] {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}
