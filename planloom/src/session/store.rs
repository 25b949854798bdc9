//! Session Store (C7, spec §4.7): thin CRUD over session metadata and
//! messages, serialised per session id (spec §5 "Conversation history per
//! session: single-writer per session").

use crate::db::connection::DatabaseConnection;
use crate::db::models::{ChatMessageRow, ChatSessionRow, NameSource, SessionSettings};
use crate::db::repositories::{MessageRepository, SessionRepository};
use crate::session::error::{SessionError, SessionResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

pub struct SessionStore {
    registry: Arc<DatabaseConnection>,
    session_locks: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionStore {
    pub fn new(registry: Arc<DatabaseConnection>) -> Self {
        Self {
            registry,
            session_locks: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Per-session mutex, held by `agent::dispatch` for the duration of a
    /// turn (spec §5 ordering guarantee: "across turns in the same session,
    /// strict FIFO").
    pub async fn lock_for(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.session_locks.lock().await;
        Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    pub async fn get(&self, session_id: &str) -> SessionResult<ChatSessionRow> {
        SessionRepository::get(self.registry.pool(), session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Create the session row if it doesn't exist yet (spec §3 lifecycle:
    /// "Session: created implicitly when a new session id sends its first
    /// message").
    pub async fn get_or_create(&self, session_id: &str) -> SessionResult<ChatSessionRow> {
        if let Some(row) = SessionRepository::get(self.registry.pool(), session_id).await? {
            return Ok(row);
        }
        debug!(session_id, "creating session implicitly on first message");
        Ok(SessionRepository::create(self.registry.pool(), session_id).await?)
    }

    pub async fn list(&self, limit: i64, offset: i64, active_only: bool) -> SessionResult<Vec<ChatSessionRow>> {
        Ok(SessionRepository::list(self.registry.pool(), limit, offset, active_only).await?)
    }

    pub async fn bind_plan(&self, session_id: &str, plan_id: i64) -> SessionResult<ChatSessionRow> {
        SessionRepository::bind_plan(self.registry.pool(), session_id, plan_id).await?;
        self.get(session_id).await
    }

    /// Explicit user rename (spec §6 `PATCH /chat/sessions/{id}`: "setting a
    /// non-empty `name` sets `is_user_named=true`").
    pub async fn set_user_name(&self, session_id: &str, name: &str) -> SessionResult<ChatSessionRow> {
        SessionRepository::rename(self.registry.pool(), session_id, name, NameSource::User.as_str(), true).await?;
        self.get(session_id).await
    }

    /// Background auto-title (spec §4.6 "Session auto-title"): only applied
    /// while the `is_user_named` flag is not sticky.
    pub async fn set_auto_title(&self, session_id: &str, name: &str, source: NameSource) -> SessionResult<ChatSessionRow> {
        let row = self.get(session_id).await?;
        if row.is_user_named {
            debug!(session_id, "skipping auto-title: session has a user-given name");
            return Ok(row);
        }
        SessionRepository::rename(self.registry.pool(), session_id, name, source.as_str(), false).await?;
        self.get(session_id).await
    }

    /// Forced auto-title (spec §6 `POST /chat/sessions/{id}/autotitle` with
    /// `force: true`): rewrites the name regardless of `is_user_named`,
    /// without flipping that flag — a later background auto-title can still
    /// run unless the user explicitly renames the session.
    pub async fn set_auto_title_forced(&self, session_id: &str, name: &str, source: NameSource) -> SessionResult<ChatSessionRow> {
        SessionRepository::rename(self.registry.pool(), session_id, name, source.as_str(), false).await?;
        self.get(session_id).await
    }

    pub async fn set_settings(&self, session_id: &str, settings: &SessionSettings) -> SessionResult<ChatSessionRow> {
        let settings_json = serde_json::to_string(settings).unwrap_or_else(|_| "{}".to_string());
        SessionRepository::set_settings(self.registry.pool(), session_id, &settings_json).await?;
        self.get(session_id).await
    }

    pub async fn set_active(&self, session_id: &str, is_active: bool) -> SessionResult<ChatSessionRow> {
        SessionRepository::set_active(self.registry.pool(), session_id, is_active).await?;
        self.get(session_id).await
    }

    /// Hard-delete or soft-archive (spec §6 `DELETE /chat/sessions/{id}?archive=bool`).
    pub async fn delete(&self, session_id: &str, archive: bool) -> SessionResult<()> {
        if archive {
            SessionRepository::archive(self.registry.pool(), session_id).await?;
        } else {
            SessionRepository::delete(self.registry.pool(), session_id).await?;
        }
        Ok(())
    }

    pub async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> SessionResult<ChatMessageRow> {
        self.get_or_create(session_id).await?;
        let metadata_json = metadata.to_string();
        let row = MessageRepository::append(self.registry.pool(), session_id, role, content, &metadata_json).await?;
        SessionRepository::touch_last_message(self.registry.pool(), session_id).await?;
        Ok(row)
    }

    pub async fn history(&self, session_id: &str, limit: i64) -> SessionResult<Vec<ChatMessageRow>> {
        Ok(MessageRepository::history(self.registry.pool(), session_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::REGISTRY_TABLES;

    async fn test_store() -> SessionStore {
        let conn = DatabaseConnection::new("sqlite::memory:").await.unwrap();
        conn.apply_schema(REGISTRY_TABLES).await.unwrap();
        SessionStore::new(Arc::new(conn))
    }

    #[tokio::test]
    async fn first_message_creates_session_implicitly() {
        let store = test_store().await;
        store.append_message("s1", "user", "hello", serde_json::json!({})).await.unwrap();
        let row = store.get("s1").await.unwrap();
        assert_eq!(row.id, "s1");
    }

    #[tokio::test]
    async fn auto_title_does_not_override_user_name() {
        let store = test_store().await;
        store.get_or_create("s1").await.unwrap();
        store.set_user_name("s1", "My Session").await.unwrap();
        let row = store.set_auto_title("s1", "Heuristic Title", NameSource::Heuristic).await.unwrap();
        assert_eq!(row.name.as_deref(), Some("My Session"));
        assert!(row.is_user_named);
    }

    #[tokio::test]
    async fn history_returns_messages_in_order() {
        let store = test_store().await;
        store.append_message("s1", "user", "hi", serde_json::json!({})).await.unwrap();
        store.append_message("s1", "assistant", "hello", serde_json::json!({})).await.unwrap();
        let history = store.history("s1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
    }
}
