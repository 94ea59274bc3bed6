//! Shared test helpers for creating BackgroundDownloader instances in tests.

use crate::config::{Config, PollingConfig};
use crate::downloader::BackgroundDownloader;
use crate::gateway::MemoryGateway;
use crate::types::Event;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::broadcast;

/// Config with millisecond polling, an immediate flush interval and a store under `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("test.db");
    config.progress.interval = Duration::from_millis(1);
    config.polling = PollingConfig {
        active_interval: Duration::from_millis(5),
        stalled_interval: Duration::from_millis(5),
        stall_threshold: 4,
        pending_interval: Duration::from_millis(5),
        paused_interval: Duration::from_millis(5),
    };
    config
}

/// Helper to create a test BackgroundDownloader over a fresh MemoryGateway.
/// Returns the downloader, the gateway and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader()
-> (BackgroundDownloader, Arc<MemoryGateway>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let gateway = Arc::new(MemoryGateway::new());
    let downloader = BackgroundDownloader::new(test_config(temp_dir.path()), gateway.clone())
        .await
        .unwrap();
    (downloader, gateway, temp_dir)
}

/// Receive events until one matches, failing after five seconds
pub(crate) async fn wait_for_event<F>(events: &mut broadcast::Receiver<Event>, mut matches: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Receive every event up to and including the first terminal one for `id`
pub(crate) async fn collect_until_terminal(
    events: &mut broadcast::Receiver<Event>,
    id: &str,
) -> Vec<Event> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            let terminal = matches!(
                &event,
                Event::Complete { id: done, .. } | Event::Failed { id: done, .. } if done == id
            );
            seen.push(event);
            if terminal {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for terminal event");
    seen
}

/// Give background tasks a moment and assert nothing arrives
pub(crate) async fn assert_quiet(events: &mut broadcast::Receiver<Event>, wait: Duration) {
    tokio::time::sleep(wait).await;
    if let Ok(event) = events.try_recv() {
        panic!("unexpected event: {event:?}");
    }
}

/// Write a file where the gateway claims it stored the transfer
pub(crate) fn gateway_file(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join("gateway").join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

/// Poll `check` until it holds, failing after five seconds
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}
