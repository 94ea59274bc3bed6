use crate::db::*;
use std::time::Duration;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_settings_absent_until_written() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path(), "test").await.unwrap();

    assert_eq!(db.get_progress_interval().await.unwrap(), None);
    assert_eq!(db.get_progress_min_bytes().await.unwrap(), None);

    db.close().await;
}

#[tokio::test]
async fn test_settings_overwrite_and_survive_reopen() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = Database::new(temp_file.path(), "test").await.unwrap();
        db.set_progress_interval(Duration::from_millis(500))
            .await
            .unwrap();
        db.set_progress_interval(Duration::from_millis(2500))
            .await
            .unwrap();
        db.set_progress_min_bytes(4096).await.unwrap();
        db.close().await;
    }

    let db = Database::new(temp_file.path(), "test").await.unwrap();
    assert_eq!(
        db.get_progress_interval().await.unwrap(),
        Some(Duration::from_millis(2500))
    );
    assert_eq!(db.get_progress_min_bytes().await.unwrap(), Some(4096));
    db.close().await;
}

#[tokio::test]
async fn test_unparsable_setting_reads_as_absent() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path(), "test").await.unwrap();

    sqlx::query(
        "INSERT INTO settings (namespace, key, value, updated_at) VALUES ('test', 'progress_min_bytes', 'lots', 0)",
    )
    .execute(db.pool())
    .await
    .unwrap();

    assert_eq!(db.get_progress_min_bytes().await.unwrap(), None);
    db.close().await;
}
