//! Registry-level plan CRUD (spec §4.2 `list_plans`/`create_plan`/`delete_plan`).
//! Tree mutation lives in `crate::plan::repository::PlanRepository`, which
//! composes this with [`super::task_repo::TaskRepository`] against the
//! per-plan file.

use crate::db::connection::DatabasePool;
use crate::db::models::PlanRow;
use chrono::Utc;

pub struct PlanRepository;

impl PlanRepository {
    pub async fn create(
        pool: &DatabasePool,
        title: &str,
        description: Option<&str>,
        metadata_json: &str,
        plan_db_path: &str,
    ) -> Result<PlanRow, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, PlanRow>(
            "INSERT INTO plans (title, description, metadata_json, plan_db_path, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(title)
        .bind(description)
        .bind(metadata_json)
        .bind(plan_db_path)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn get(pool: &DatabasePool, id: i64) -> Result<Option<PlanRow>, sqlx::Error> {
        sqlx::query_as::<_, PlanRow>("SELECT * FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &DatabasePool) -> Result<Vec<PlanRow>, sqlx::Error> {
        sqlx::query_as::<_, PlanRow>("SELECT * FROM plans ORDER BY updated_at DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn touch(pool: &DatabasePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE plans SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete(pool: &DatabasePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::REGISTRY_TABLES;

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let pool = sqlx::sqlite::SqlitePool::connect("sqlite::memory:").await.unwrap();
        for stmt in REGISTRY_TABLES {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }

        let created = PlanRepository::create(&pool, "My Plan", None, "{}", "plans/1.db")
            .await
            .unwrap();
        let listed = PlanRepository::list(&pool).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
    }
}
