//! Server binary: wires every planloom subsystem into an axum router and
//! serves spec §6's HTTP surface.

use planloom::agent::tools::NullToolInvoker;
use planloom::agent::{AgentConfig, AgentDeps};
use planloom::api::{create_router, AppState};
use planloom::config::AppConfig;
use planloom::db::connection::DatabaseConnection;
use planloom::db::plan_store::PlanFileCache;
use planloom::db::schema::{REGISTRY_TABLES, SHARED_JOB_STORE_TABLES};
use planloom::jobs::manager::JobManager;
use planloom::plan::PlanRepository;
use planloom::session::SessionStore;
use planloom_llm::generic::GenericChatModel;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    tracing::info!("loading configuration from the environment");
    let config = AppConfig::from_env()?;

    tokio::fs::create_dir_all(&config.database.db_root).await?;
    tokio::fs::create_dir_all(config.database.plan_dir()).await?;

    let registry_url = format!("sqlite://{}?mode=rwc", config.database.registry_path());
    let jobs_url = format!("sqlite://{}/jobs.sqlite3?mode=rwc", config.database.db_root);

    tracing::info!(path = %config.database.registry_path(), "opening main registry");
    let registry = Arc::new(DatabaseConnection::new(&registry_url).await?);
    registry.apply_schema(REGISTRY_TABLES).await?;

    tracing::info!("opening shared job store");
    let shared_jobs_store = Arc::new(DatabaseConnection::new(&jobs_url).await?);
    shared_jobs_store.apply_schema(SHARED_JOB_STORE_TABLES).await?;

    let files = Arc::new(PlanFileCache::new(config.database.plan_dir()));

    let plans = Arc::new(PlanRepository::new(Arc::clone(&registry), Arc::clone(&files)));
    let sessions = Arc::new(SessionStore::new(Arc::clone(&registry)));
    let jobs = Arc::new(JobManager::new(Arc::clone(&registry), Arc::clone(&files), shared_jobs_store));

    let conversation_llm = Arc::new(GenericChatModel::new(config.conversation_llm.clone()));
    let decomposer_llm = Arc::new(GenericChatModel::new(config.decomposition_llm.clone()));
    let executor_llm = Arc::new(GenericChatModel::new(config.executor_llm.clone()));

    let deps = AgentDeps {
        plans,
        sessions,
        jobs,
        conversation_llm,
        decomposer_llm,
        executor_llm,
        tool_invoker: Arc::new(NullToolInvoker),
        decomposer_config: config.decomposer.clone(),
        executor_config: config.executor.clone(),
    };

    let agent_config = AgentConfig {
        auto_decompose_on_create: config.auto_decompose_on_create,
        ..AgentConfig::default()
    };

    let state = AppState::new(deps, agent_config);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(%addr, "starting planloom server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("planloom server shut down gracefully");
    Ok(())
}

/// Ctrl-C or SIGTERM (teacher's own `orchestrator-server` shutdown idiom).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received CTRL-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
