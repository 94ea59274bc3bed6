//! Database layer for background-dl
//!
//! Handles SQLite persistence of the task store: the handle → task config map, the
//! runtime progress settings, and clean-shutdown tracking.
//!
//! Every row is scoped by the namespace the [`Database`] was opened with, so several
//! engines can share one file without seeing each other's tasks.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`tasks`]: Task store CRUD
//! - [`settings`]: Persisted progress settings
//! - [`state`]: Runtime state (shutdown tracking)

use crate::types::{TaskConfig, TaskId};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod migrations;
mod settings;
mod state;
mod tasks;

/// Task record from database
///
/// The flat on-disk form of a [`TaskConfig`]; conversion is explicit in both
/// directions so the schema does not depend on any serialization format.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Gateway handle (primary key within the namespace)
    pub handle: i64,
    /// Client task id
    pub task_id: String,
    /// Source URL
    pub url: String,
    /// Final destination path
    pub destination: String,
    /// Opaque client metadata
    pub metadata: String,
    /// Whether the begin event was already emitted
    pub reported_begin: bool,
    /// Notification title passed to the gateway
    pub notification_title: Option<String>,
    /// Unix timestamp when the task was stored
    pub created_at: i64,
}

impl From<TaskRow> for TaskConfig {
    fn from(row: TaskRow) -> Self {
        TaskConfig {
            id: TaskId(row.task_id),
            url: row.url,
            destination: PathBuf::from(row.destination),
            metadata: row.metadata,
            reported_begin: row.reported_begin,
            notification_title: row.notification_title,
        }
    }
}

/// Database handle for background-dl
pub struct Database {
    pool: SqlitePool,
    namespace: String,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
