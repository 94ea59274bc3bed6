//! Persisted runtime settings (progress interval and byte threshold).

use crate::error::DatabaseError;
use crate::{Error, Result};
use std::time::Duration;

use super::Database;

const PROGRESS_INTERVAL_KEY: &str = "progress_interval_ms";
const PROGRESS_MIN_BYTES_KEY: &str = "progress_min_bytes";

impl Database {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM settings WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read setting {}: {}",
                    key, e
                )))
            })
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO settings (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write setting {}: {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Stored progress interval, if one was ever saved
    ///
    /// A value that does not parse is treated as absent.
    pub async fn get_progress_interval(&self) -> Result<Option<Duration>> {
        let value = self.get_setting(PROGRESS_INTERVAL_KEY).await?;
        Ok(value
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis))
    }

    /// Persist the progress interval
    pub async fn set_progress_interval(&self, interval: Duration) -> Result<()> {
        self.set_setting(PROGRESS_INTERVAL_KEY, &interval.as_millis().to_string())
            .await
    }

    /// Stored progress byte threshold, if one was ever saved
    pub async fn get_progress_min_bytes(&self) -> Result<Option<u64>> {
        let value = self.get_setting(PROGRESS_MIN_BYTES_KEY).await?;
        Ok(value.and_then(|v| v.parse::<u64>().ok()))
    }

    /// Persist the progress byte threshold
    pub async fn set_progress_min_bytes(&self, min_bytes: u64) -> Result<()> {
        self.set_setting(PROGRESS_MIN_BYTES_KEY, &min_bytes.to_string())
            .await
    }
}
