//! Task store CRUD: the durable handle → task config map.

use crate::error::DatabaseError;
use crate::types::{DownloadHandle, TaskConfig, TaskId};
use crate::{Error, Result};
use std::collections::BTreeMap;

use super::{Database, TaskRow};

impl Database {
    /// Persist a new task under its gateway handle
    ///
    /// Fails with [`DatabaseError::ConstraintViolation`] if the handle is already stored.
    pub async fn insert_task(&self, handle: DownloadHandle, config: &TaskConfig) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let destination = config.destination.to_string_lossy().into_owned();

        sqlx::query(
            r#"
            INSERT INTO tasks (
                namespace, handle, task_id, url, destination, metadata,
                reported_begin, notification_title, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.namespace)
        .bind(handle)
        .bind(config.id.as_str())
        .bind(&config.url)
        .bind(&destination)
        .bind(&config.metadata)
        .bind(config.reported_begin)
        .bind(&config.notification_title)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "Task handle {} already stored",
                    handle
                )))
            }
            other => Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert task: {}",
                other
            ))),
        })?;

        Ok(())
    }

    /// Get a task by handle
    pub async fn get_task(&self, handle: DownloadHandle) -> Result<Option<TaskConfig>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT handle, task_id, url, destination, metadata,
                   reported_begin, notification_title, created_at
            FROM tasks WHERE namespace = ? AND handle = ?
            "#,
        )
        .bind(&self.namespace)
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task: {}",
                e
            )))
        })?;

        Ok(row.map(TaskConfig::from))
    }

    /// Find the handle a task id is stored under
    pub async fn find_handle(&self, id: &TaskId) -> Result<Option<DownloadHandle>> {
        let handle: Option<DownloadHandle> = sqlx::query_scalar(
            r#"
            SELECT handle FROM tasks
            WHERE namespace = ? AND task_id = ?
            ORDER BY handle DESC
            LIMIT 1
            "#,
        )
        .bind(&self.namespace)
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to find task handle: {}",
                e
            )))
        })?;

        Ok(handle)
    }

    /// Load every stored task, keyed by handle
    pub async fn list_tasks(&self) -> Result<BTreeMap<DownloadHandle, TaskConfig>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT handle, task_id, url, destination, metadata,
                   reported_begin, notification_title, created_at
            FROM tasks WHERE namespace = ?
            ORDER BY handle ASC
            "#,
        )
        .bind(&self.namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks: {}",
                e
            )))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| (DownloadHandle(row.handle), TaskConfig::from(row)))
            .collect())
    }

    /// Record that the begin event was emitted for a task
    pub async fn set_reported_begin(&self, handle: DownloadHandle) -> Result<()> {
        sqlx::query("UPDATE tasks SET reported_begin = 1 WHERE namespace = ? AND handle = ?")
            .bind(&self.namespace)
            .bind(handle)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to mark begin reported: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Remove a task; returns whether a row was deleted
    pub async fn remove_task(&self, handle: DownloadHandle) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE namespace = ? AND handle = ?")
            .bind(&self.namespace)
            .bind(handle)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to remove task: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Count stored tasks
    pub async fn count_tasks(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE namespace = ?")
            .bind(&self.namespace)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count tasks: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}
