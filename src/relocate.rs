//! Dedicated file mover for completed transfers
//!
//! All moves go through one worker task, so two completions never interleave writes to
//! overlapping destination paths. A move whose source is already gone counts as done,
//! which makes completion handling idempotent across restarts.

use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

use crate::{Error, Result};

struct MoveJob {
    source: PathBuf,
    destination: PathBuf,
    reply: oneshot::Sender<io::Result<()>>,
}

/// Handle to the single-worker file mover
///
/// Cloning shares the same worker. The worker exits once every handle is dropped.
#[derive(Clone, Debug)]
pub struct FileMover {
    tx: mpsc::Sender<MoveJob>,
}

impl FileMover {
    /// Spawn the worker on the current runtime
    pub fn spawn() -> Self {
        Self::spawn_after(std::future::ready(()))
    }

    /// Spawn a worker that holds every move until `gate` resolves
    #[cfg(test)]
    pub(crate) fn spawn_gated(gate: oneshot::Receiver<()>) -> Self {
        Self::spawn_after(async {
            gate.await.ok();
        })
    }

    fn spawn_after<F>(start: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<MoveJob>(64);
        tokio::spawn(async move {
            start.await;
            while let Some(job) = rx.recv().await {
                let result = move_file(&job.source, &job.destination).await;
                // the requester may have given up waiting
                job.reply.send(result).ok();
            }
        });
        Self { tx }
    }

    /// Move `source` to `destination`, waiting for the worker to finish it
    pub async fn relocate(&self, source: PathBuf, destination: PathBuf) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(MoveJob {
                source,
                destination,
                reply,
            })
            .await
            .map_err(|_| Error::Other("file mover stopped".to_string()))?;

        done.await
            .map_err(|_| Error::Other("file mover dropped the request".to_string()))?
            .map_err(Error::Io)
    }
}

/// First ancestor of `dir` (inclusive) that does not exist yet
async fn first_missing_ancestor(dir: &Path) -> Option<PathBuf> {
    let mut missing = None;
    let mut current = Some(dir);
    while let Some(path) = current {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            break;
        }
        missing = Some(path.to_path_buf());
        current = path.parent();
    }
    missing
}

/// Replace `destination` with `source`
///
/// A missing source is treated as already moved. On failure the destination, any parent
/// directory created here, and the source are removed before the error is returned.
pub async fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    if source == destination || !tokio::fs::try_exists(source).await? {
        tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            "Source already moved"
        );
        return Ok(());
    }

    let created_dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => first_missing_ancestor(parent).await,
        _ => None,
    };

    let result = async {
        if tokio::fs::try_exists(destination).await? {
            tokio::fs::remove_file(destination).await?;
        }
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::rename(source, destination).await.is_err() {
            // rename cannot cross filesystems
            tokio::fs::copy(source, destination).await?;
            tokio::fs::remove_file(source).await?;
        }
        Ok::<(), io::Error>(())
    }
    .await;

    if let Err(e) = &result {
        tracing::warn!(
            source = %source.display(),
            destination = %destination.display(),
            error = %e,
            "File move failed, cleaning up"
        );
        tokio::fs::remove_file(destination).await.ok();
        if let Some(dir) = created_dir {
            tokio::fs::remove_dir_all(dir).await.ok();
        }
        tokio::fs::remove_file(source).await.ok();
    }

    result
}
