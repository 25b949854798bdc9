//! The main registry: one SQLite file holding plans, sessions, messages, and
//! the job index (spec §4.1).

use crate::db::connection::DatabaseConnection;
use crate::db::schema::REGISTRY_TABLES;

/// Open (creating if absent) the main registry and apply its schema.
pub async fn open_registry(database_url: &str) -> Result<DatabaseConnection, sqlx::Error> {
    let conn = DatabaseConnection::new(database_url).await?;
    conn.apply_schema(REGISTRY_TABLES).await?;
    Ok(conn)
}

/// Open the shared store for jobs with no `plan_id` (spec §4.1: "a distinct
/// shared store holds jobs not tied to a plan").
pub async fn open_shared_job_store(database_url: &str) -> Result<DatabaseConnection, sqlx::Error> {
    let conn = DatabaseConnection::new(database_url).await?;
    conn.apply_schema(crate::db::schema::SHARED_JOB_STORE_TABLES).await?;
    Ok(conn)
}
