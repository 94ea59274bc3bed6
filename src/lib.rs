//! # background-dl
//!
//! Crash-safe orchestration of background downloads performed by an OS download service.
//!
//! The transfer itself (HTTP, retries, chunking) belongs to the platform's download
//! service, reached through the [`DownloadGateway`] trait. This crate:
//! - **Persists** the task id ↔ handle ↔ config map in SQLite, so tracking survives restarts
//! - **Observes** transfers by polling and turns raw statuses into a small state machine
//! - **Throttles** progress into batched events bounded system-wide
//! - **Relocates** finished files to their destination, idempotently
//! - **Classifies** failures into a stable [`ErrorCode`] taxonomy
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use background_dl::{BackgroundDownloader, Config, DownloadOptions, DownloadRequest, Event};
//! use background_dl::gateway::MemoryGateway;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Arc::new(MemoryGateway::new());
//!     let downloader = BackgroundDownloader::new(Config::default(), gateway).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::Complete { id, location, .. } = event {
//!                 println!("{id} saved to {}", location.display());
//!             }
//!         }
//!     });
//!
//!     downloader
//!         .submit(
//!             DownloadRequest::new("a", "http://example.com/file.bin", "/data/file.bin"),
//!             DownloadOptions::default(),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Task orchestrator (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// OS download gateway seam
pub mod gateway;
/// Request header assembly
pub mod http;
/// Per-task progress polling
pub mod monitor;
/// One-shot header probe
pub mod probe;
/// Bounded redirect resolution
pub mod redirect;
/// Serialized file relocation
pub mod relocate;
/// Progress batching and flushing
pub mod throttle;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use downloader::BackgroundDownloader;
pub use error::{DatabaseError, Error, ErrorCode, Result, TaskFailure};
pub use gateway::DownloadGateway;
pub use types::{
    DownloadHandle, DownloadOptions, DownloadRequest, Event, ProgressReport, TaskConfig, TaskId,
    TaskSnapshot, TaskState,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use background_dl::{BackgroundDownloader, Config, run_with_shutdown};
/// use background_dl::gateway::MemoryGateway;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader =
///         BackgroundDownloader::new(Config::default(), Arc::new(MemoryGateway::new())).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: BackgroundDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
