//! Task repository: per-plan-file CRUD plus the anchor/resequencing SQL that
//! backs the Plan Repository's insertion invariants (spec §4.2).

use crate::db::connection::DatabasePool;
use crate::db::models::TaskRow;
use chrono::Utc;
use std::collections::HashMap;

/// Task repository for managing per-plan task database operations.
pub struct TaskRepository;

impl TaskRepository {
    pub async fn insert(
        pool: &DatabasePool,
        parent_id: Option<i64>,
        position: i64,
        path: &str,
        depth: i64,
        name: &str,
        instruction: Option<&str>,
        metadata_json: &str,
    ) -> Result<TaskRow, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, TaskRow>(
            "INSERT INTO tasks
                (parent_id, position, path, depth, name, instruction, metadata_json, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
             RETURNING *",
        )
        .bind(parent_id)
        .bind(position)
        .bind(path)
        .bind(depth)
        .bind(name)
        .bind(instruction)
        .bind(metadata_json)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn get(pool: &DatabasePool, id: i64) -> Result<Option<TaskRow>, sqlx::Error> {
        sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &DatabasePool) -> Result<Vec<TaskRow>, sqlx::Error> {
        sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks ORDER BY depth, position")
            .fetch_all(pool)
            .await
    }

    /// Children of `parent_id` (or roots, when `None`) ordered by position.
    pub async fn list_by_parent(
        pool: &DatabasePool,
        parent_id: Option<i64>,
    ) -> Result<Vec<TaskRow>, sqlx::Error> {
        match parent_id {
            Some(pid) => {
                sqlx::query_as::<_, TaskRow>(
                    "SELECT * FROM tasks WHERE parent_id = ? ORDER BY position",
                )
                .bind(pid)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query_as::<_, TaskRow>(
                    "SELECT * FROM tasks WHERE parent_id IS NULL ORDER BY position",
                )
                .fetch_all(pool)
                .await
            }
        }
    }

    /// Number of existing children of `parent_id` (used to default-append at
    /// `last_child`).
    /// Shift the position of every sibling at or after `from_position` by
    /// `delta`, making room for (or closing the gap left by) an insertion or
    /// removal. Callers must follow with [`Self::resequence_siblings`] to
    /// collapse any gaps into a contiguous `0..k-1` range.
    pub async fn shift_siblings(
        pool: &DatabasePool,
        parent_id: Option<i64>,
        from_position: i64,
        delta: i64,
    ) -> Result<(), sqlx::Error> {
        match parent_id {
            Some(pid) => {
                sqlx::query(
                    "UPDATE tasks SET position = position + ? WHERE parent_id = ? AND position >= ?",
                )
                .bind(delta)
                .bind(pid)
                .bind(from_position)
                .execute(pool)
                .await?;
            }
            None => {
                sqlx::query(
                    "UPDATE tasks SET position = position + ? WHERE parent_id IS NULL AND position >= ?",
                )
                .bind(delta)
                .bind(from_position)
                .execute(pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Collapse the positions of `parent_id`'s children to a contiguous
    /// `0..k-1` range, preserving relative order (spec §3 invariant "sibling
    /// order").
    pub async fn resequence_siblings(
        pool: &DatabasePool,
        parent_id: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        let children = Self::list_by_parent(pool, parent_id).await?;
        for (index, child) in children.iter().enumerate() {
            if child.position != index as i64 {
                sqlx::query("UPDATE tasks SET position = ? WHERE id = ?")
                    .bind(index as i64)
                    .bind(child.id)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn update_fields(
        pool: &DatabasePool,
        id: i64,
        name: Option<&str>,
        instruction: Option<Option<&str>>,
        metadata_json: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        if let Some(name) = name {
            sqlx::query("UPDATE tasks SET name = ?, updated_at = ? WHERE id = ?")
                .bind(name)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await?;
        }
        if let Some(instruction) = instruction {
            sqlx::query("UPDATE tasks SET instruction = ?, updated_at = ? WHERE id = ?")
                .bind(instruction)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await?;
        }
        if let Some(metadata_json) = metadata_json {
            sqlx::query("UPDATE tasks SET metadata_json = ?, updated_at = ? WHERE id = ?")
                .bind(metadata_json)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await?;
        }
        Ok(())
    }

    pub async fn update_status(pool: &DatabasePool, id: i64, status: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_execution_result(
        pool: &DatabasePool,
        id: i64,
        status: &str,
        execution_result_json: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET status = ?, execution_result_json = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(execution_result_json)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_context(
        pool: &DatabasePool,
        id: i64,
        context_combined: Option<&str>,
        context_sections_json: Option<&str>,
        context_meta_json: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks
             SET context_combined = ?, context_sections_json = ?, context_meta_json = ?,
                 context_updated_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(context_combined)
        .bind(context_sections_json)
        .bind(context_meta_json)
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Reparent a node, updating its own `parent_id`/`position`/`depth`/`path`.
    /// Descendant `depth`/`path` are refreshed separately by the caller
    /// (the Plan Repository recomputes them from the in-memory tree and
    /// calls [`Self::set_path_and_depth`] per node).
    pub async fn set_parent(
        pool: &DatabasePool,
        id: i64,
        new_parent_id: Option<i64>,
        new_position: i64,
        new_path: &str,
        new_depth: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET parent_id = ?, position = ?, path = ?, depth = ?, updated_at = ? WHERE id = ?",
        )
        .bind(new_parent_id)
        .bind(new_position)
        .bind(new_path)
        .bind(new_depth)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_path_and_depth(
        pool: &DatabasePool,
        id: i64,
        path: &str,
        depth: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET path = ?, depth = ? WHERE id = ?")
            .bind(path)
            .bind(depth)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete a node and every row in its subtree, plus dependency edges
    /// referencing any of them (spec §4.2 `delete_task`).
    pub async fn delete_subtree(pool: &DatabasePool, ids: &[i64]) -> Result<(), sqlx::Error> {
        for id in ids {
            sqlx::query("DELETE FROM task_dependencies WHERE task_id = ? OR depends_on = ?")
                .bind(id)
                .bind(id)
                .execute(pool)
                .await?;
            sqlx::query("DELETE FROM tasks WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await?;
        }
        Ok(())
    }

    pub async fn dependencies_for(pool: &DatabasePool, task_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT depends_on FROM task_dependencies WHERE task_id = ?")
                .bind(task_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Replace a task's dependency set wholesale. Callers are responsible for
    /// filtering to ids that exist in the same plan (spec §3 invariant
    /// "dependency validity").
    pub async fn replace_dependencies(
        pool: &DatabasePool,
        task_id: i64,
        depends_on: &[i64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_dependencies WHERE task_id = ?")
            .bind(task_id)
            .execute(pool)
            .await?;
        for dep in depends_on {
            sqlx::query("INSERT INTO task_dependencies (task_id, depends_on) VALUES (?, ?)")
                .bind(task_id)
                .bind(dep)
                .execute(pool)
                .await?;
        }
        Ok(())
    }

    pub async fn all_dependencies(
        pool: &DatabasePool,
    ) -> Result<HashMap<i64, Vec<i64>>, sqlx::Error> {
        let rows: Vec<(i64, i64)> = sqlx::query_as("SELECT task_id, depends_on FROM task_dependencies")
            .fetch_all(pool)
            .await?;
        let mut map: HashMap<i64, Vec<i64>> = HashMap::new();
        for (task_id, depends_on) in rows {
            map.entry(task_id).or_default().push(depends_on);
        }
        Ok(map)
    }

    pub async fn count_all(pool: &DatabasePool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks").fetch_one(pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::PLAN_FILE_TABLES;

    async fn test_pool() -> DatabasePool {
        let pool = sqlx::sqlite::SqlitePool::connect("sqlite::memory:").await.unwrap();
        for stmt in PLAN_FILE_TABLES {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn insert_assigns_contiguous_positions() {
        let pool = test_pool().await;
        TaskRepository::insert(&pool, None, 0, "0", 0, "root", None, "{}").await.unwrap();
        let root = TaskRepository::list_by_parent(&pool, None).await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].position, 0);
    }

    #[tokio::test]
    async fn shift_then_resequence_makes_room_for_anchor_insert() {
        let pool = test_pool().await;
        let a = TaskRepository::insert(&pool, Some(9), 0, "9.0", 1, "A", None, "{}").await.unwrap();
        let b = TaskRepository::insert(&pool, Some(9), 1, "9.1", 1, "B", None, "{}").await.unwrap();
        let c = TaskRepository::insert(&pool, Some(9), 2, "9.2", 1, "C", None, "{}").await.unwrap();

        // Insert X before B (position 1): shift B, C right by one, then the
        // caller inserts X at position 1.
        TaskRepository::shift_siblings(&pool, Some(9), 1, 1).await.unwrap();
        let x = TaskRepository::insert(&pool, Some(9), 1, "9.1", 1, "X", None, "{}").await.unwrap();
        TaskRepository::resequence_siblings(&pool, Some(9)).await.unwrap();

        let siblings = TaskRepository::list_by_parent(&pool, Some(9)).await.unwrap();
        let positions: Vec<(i64, i64)> = siblings.iter().map(|t| (t.id, t.position)).collect();
        assert_eq!(
            positions,
            vec![(a.id, 0), (x.id, 1), (b.id, 2), (c.id, 3)]
        );
    }

    #[tokio::test]
    async fn delete_subtree_removes_dependency_edges() {
        let pool = test_pool().await;
        let a = TaskRepository::insert(&pool, None, 0, "0", 0, "A", None, "{}").await.unwrap();
        let b = TaskRepository::insert(&pool, None, 1, "1", 0, "B", None, "{}").await.unwrap();
        TaskRepository::replace_dependencies(&pool, b.id, &[a.id]).await.unwrap();

        TaskRepository::delete_subtree(&pool, &[a.id]).await.unwrap();

        let deps = TaskRepository::dependencies_for(&pool, b.id).await.unwrap();
        assert!(deps.is_empty());
    }
}
