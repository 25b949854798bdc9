//! Chat session repository (main registry, spec §4.7 "Session Store").

use crate::db::connection::DatabasePool;
use crate::db::models::ChatSessionRow;
use chrono::Utc;

pub struct SessionRepository;

impl SessionRepository {
    /// Create a session implicitly on first message (spec §3 lifecycle).
    pub async fn create(pool: &DatabasePool, id: &str) -> Result<ChatSessionRow, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, ChatSessionRow>(
            "INSERT INTO chat_sessions
                (id, plan_id, name, name_source, is_user_named, is_active, settings_json, created_at, updated_at)
             VALUES (?, NULL, NULL, 'default', 0, 1, '{}', ?, ?)
             RETURNING *",
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn get(pool: &DatabasePool, id: &str) -> Result<Option<ChatSessionRow>, sqlx::Error> {
        sqlx::query_as::<_, ChatSessionRow>("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &DatabasePool,
        limit: i64,
        offset: i64,
        active_only: bool,
    ) -> Result<Vec<ChatSessionRow>, sqlx::Error> {
        if active_only {
            sqlx::query_as::<_, ChatSessionRow>(
                "SELECT * FROM chat_sessions WHERE is_active = 1 AND archived_at IS NULL
                 ORDER BY updated_at DESC LIMIT ? OFFSET ?",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        } else {
            sqlx::query_as::<_, ChatSessionRow>(
                "SELECT * FROM chat_sessions ORDER BY updated_at DESC LIMIT ? OFFSET ?",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
    }

    /// Bind a session to a plan (spec §4.6: "On `create_plan` success, the
    /// session is auto-bound to the new plan").
    pub async fn bind_plan(pool: &DatabasePool, id: &str, plan_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE chat_sessions SET plan_id = ?, updated_at = ? WHERE id = ?")
            .bind(plan_id)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Rename a session. `is_user_named` becomes sticky once set by a user
    /// (spec §6: "setting a non-empty `name` sets `is_user_named=true`").
    pub async fn rename(
        pool: &DatabasePool,
        id: &str,
        name: &str,
        name_source: &str,
        is_user_named: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE chat_sessions SET name = ?, name_source = ?, is_user_named = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(name_source)
        .bind(is_user_named)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_active(pool: &DatabasePool, id: &str, is_active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE chat_sessions SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_settings(pool: &DatabasePool, id: &str, settings_json: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE chat_sessions SET settings_json = ?, updated_at = ? WHERE id = ?")
            .bind(settings_json)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn touch_last_message(pool: &DatabasePool, id: &str) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query("UPDATE chat_sessions SET last_message_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Soft-archive (spec §6 `DELETE /chat/sessions/{id}?archive=bool`).
    pub async fn archive(pool: &DatabasePool, id: &str) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query("UPDATE chat_sessions SET archived_at = ?, is_active = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete(pool: &DatabasePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
