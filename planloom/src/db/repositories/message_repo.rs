//! Chat message repository (main registry).

use crate::db::connection::DatabasePool;
use crate::db::models::ChatMessageRow;
use chrono::Utc;

pub struct MessageRepository;

impl MessageRepository {
    pub async fn append(
        pool: &DatabasePool,
        session_id: &str,
        role: &str,
        content: &str,
        metadata_json: &str,
    ) -> Result<ChatMessageRow, sqlx::Error> {
        sqlx::query_as::<_, ChatMessageRow>(
            "INSERT INTO chat_messages (session_id, role, content, metadata_json, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .bind(metadata_json)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn history(
        pool: &DatabasePool,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessageRow>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessageRow>(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map(|mut rows| {
            rows.reverse();
            rows
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::REGISTRY_TABLES;

    #[tokio::test]
    async fn history_returns_chronological_order() {
        let pool = sqlx::sqlite::SqlitePool::connect("sqlite::memory:").await.unwrap();
        for stmt in REGISTRY_TABLES {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }

        MessageRepository::append(&pool, "s1", "user", "hi", "{}").await.unwrap();
        MessageRepository::append(&pool, "s1", "assistant", "hello", "{}").await.unwrap();

        let history = MessageRepository::history(&pool, "s1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "hello");
    }
}
