//! Route table (spec §6 HTTP endpoints).

use crate::api::handlers::{chat, jobs, plans, sessions};
use crate::api::middleware::{cors_layer, logging_layer};
use crate::api::state::AppState;
use axum::routing::{delete, get, patch, post};
use axum::Router;

/// Build the full application router over `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chat/message", post(chat::send_message))
        .route("/chat/actions/:tracking_id", get(chat::action_status))
        .route("/chat/history/:session_id", get(chat::history))
        .route("/chat/sessions", get(sessions::list_sessions))
        .route("/chat/sessions/:id", patch(sessions::update_session))
        .route("/chat/sessions/:id", delete(sessions::delete_session))
        .route("/chat/sessions/:id/autotitle", post(sessions::auto_title))
        .route("/plans", get(plans::list_plans))
        .route("/plans/:id/tree", get(plans::plan_tree))
        .route("/plans/:id/subgraph", get(plans::subgraph))
        .route("/plans/:id/results", get(plans::plan_results))
        .route("/plans/:id/execution/summary", get(plans::execution_summary))
        .route("/tasks/:id/result", get(plans::task_result))
        .route("/tasks/:id/decompose", post(plans::decompose_task))
        .route("/jobs/:id", get(jobs::get_job))
        .route("/jobs/:id/stream", get(jobs::stream_job))
        .layer(cors_layer())
        .layer(logging_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::NullToolInvoker;
    use crate::agent::{AgentConfig, AgentDeps};
    use crate::db::connection::DatabaseConnection;
    use crate::db::plan_store::PlanFileCache;
    use crate::db::schema::REGISTRY_TABLES;
    use crate::decomposer::DecomposerConfig;
    use crate::executor::ExecutorConfig;
    use crate::jobs::manager::JobManager;
    use crate::session::SessionStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use planloom_llm::{ChatModel, ChatRequest, ChatResponse, Message};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Debug)]
    struct EchoModel;

    #[async_trait::async_trait]
    impl ChatModel for EchoModel {
        async fn chat(&self, _request: ChatRequest) -> planloom_llm::Result<ChatResponse> {
            Ok(ChatResponse::new(Message::assistant(
                r#"{"llm_reply":{"message":"hi there"},"actions":[]}"#,
            )))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    async fn test_state() -> AppState {
        let registry = Arc::new(DatabaseConnection::new("sqlite::memory:").await.unwrap());
        registry.apply_schema(REGISTRY_TABLES).await.unwrap();
        let files = Arc::new(PlanFileCache::new(std::env::temp_dir().join("planloom-route-tests")));
        let jobs_store = Arc::new(DatabaseConnection::new("sqlite::memory:").await.unwrap());

        let plans = Arc::new(crate::plan::PlanRepository::new(Arc::clone(&registry), Arc::clone(&files)));
        let sessions = Arc::new(SessionStore::new(Arc::clone(&registry)));
        let jobs = Arc::new(JobManager::new(Arc::clone(&registry), files, jobs_store));

        let deps = AgentDeps {
            plans,
            sessions,
            jobs,
            conversation_llm: Arc::new(EchoModel),
            decomposer_llm: Arc::new(EchoModel),
            executor_llm: Arc::new(EchoModel),
            tool_invoker: Arc::new(NullToolInvoker),
            decomposer_config: DecomposerConfig::default(),
            executor_config: ExecutorConfig::default(),
        };
        AppState::new(deps, AgentConfig::default())
    }

    #[tokio::test]
    async fn list_plans_returns_ok_for_a_fresh_registry() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/plans").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_job_id_is_not_found() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/jobs/does-not-exist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
