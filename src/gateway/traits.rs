//! Traits and types for the download gateway

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::types::{DownloadHandle, TaskState};

/// Raw transfer status as reported by the gateway
///
/// The numeric codes are the gateway-native ones and are what hosts forward verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    /// Waiting to start
    Pending,
    /// Transferring
    Running,
    /// Paused; the reason says why
    Paused,
    /// Finished successfully
    Successful,
    /// Finished with an error; the reason says why
    Failed,
}

impl GatewayStatus {
    /// Gateway-native numeric code
    pub fn code(&self) -> i32 {
        match self {
            GatewayStatus::Pending => 1,
            GatewayStatus::Running => 2,
            GatewayStatus::Paused => 4,
            GatewayStatus::Successful => 8,
            GatewayStatus::Failed => 16,
        }
    }

    /// Parse a gateway-native code; unknown codes are treated as failures
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => GatewayStatus::Pending,
            2 => GatewayStatus::Running,
            4 => GatewayStatus::Paused,
            8 => GatewayStatus::Successful,
            _ => GatewayStatus::Failed,
        }
    }

    /// Map the raw status onto the engine's state machine
    pub fn task_state(&self) -> TaskState {
        match self {
            GatewayStatus::Failed => TaskState::Canceling,
            GatewayStatus::Paused => TaskState::Suspended,
            GatewayStatus::Pending | GatewayStatus::Running => TaskState::Running,
            GatewayStatus::Successful => TaskState::Completed,
        }
    }

    /// Whether the gateway will not touch the transfer again
    pub fn is_terminal(&self) -> bool {
        matches!(self, GatewayStatus::Successful | GatewayStatus::Failed)
    }
}

/// Notification visibility requested for a transfer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// No notification
    #[default]
    Hidden,
    /// Notification while running and after completion
    VisibleNotifyCompleted,
}

/// A transfer request handed to [`DownloadGateway::enqueue`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Source URL
    pub url: String,
    /// Request headers, in the order they should be applied
    pub headers: Vec<(String, String)>,
    /// Allow metered networks
    pub allow_metered: bool,
    /// Allow roaming
    pub allow_roaming: bool,
    /// Notification visibility
    pub visibility: Visibility,
    /// Notification title
    pub title: Option<String>,
    /// File name the gateway should write to in its own storage area
    pub destination_hint: String,
}

/// One row returned by [`DownloadGateway::query`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatus {
    /// Raw status
    pub status: GatewayStatus,
    /// Gateway-native reason code; meaningful for `Paused` and `Failed`
    pub reason: i32,
    /// Bytes written so far
    pub bytes_downloaded: i64,
    /// Expected total, `-1` or `0` when unknown
    pub bytes_total: i64,
    /// Where the gateway put the file, once known
    pub local_path: Option<PathBuf>,
}

impl TransferStatus {
    /// Queued transfer with no byte counts yet
    pub fn pending() -> Self {
        Self {
            status: GatewayStatus::Pending,
            reason: 0,
            bytes_downloaded: 0,
            bytes_total: -1,
            local_path: None,
        }
    }

    /// Active transfer
    pub fn running(bytes_downloaded: i64, bytes_total: i64) -> Self {
        Self {
            status: GatewayStatus::Running,
            reason: 0,
            bytes_downloaded,
            bytes_total,
            local_path: None,
        }
    }

    /// Paused transfer
    pub fn paused(reason: i32, bytes_downloaded: i64, bytes_total: i64) -> Self {
        Self {
            status: GatewayStatus::Paused,
            reason,
            bytes_downloaded,
            bytes_total,
            local_path: None,
        }
    }

    /// Finished transfer whose file sits at `local_path`
    pub fn successful(local_path: impl Into<PathBuf>, bytes_downloaded: i64, bytes_total: i64) -> Self {
        Self {
            status: GatewayStatus::Successful,
            reason: 0,
            bytes_downloaded,
            bytes_total,
            local_path: Some(local_path.into()),
        }
    }

    /// Failed transfer
    pub fn failed(reason: i32, bytes_downloaded: i64, bytes_total: i64) -> Self {
        Self {
            status: GatewayStatus::Failed,
            reason,
            bytes_downloaded,
            bytes_total,
            local_path: None,
        }
    }
}

/// Trait for the OS-level download service
///
/// Implementations own the actual transfer: HTTP, TLS, retries and storage. The engine
/// only enqueues, cancels, and observes.
///
/// # Examples
///
/// ```
/// use background_dl::gateway::{DownloadGateway, GatewayRequest, MemoryGateway, Visibility};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = MemoryGateway::new();
/// let handle = gateway
///     .enqueue(GatewayRequest {
///         url: "http://example.com/file.bin".to_string(),
///         headers: vec![],
///         allow_metered: true,
///         allow_roaming: true,
///         visibility: Visibility::Hidden,
///         title: None,
///         destination_hint: "1234.bin".to_string(),
///     })
///     .await?;
///
/// let status = gateway.query(handle).await?;
/// assert!(status.is_some());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DownloadGateway: Send + Sync {
    /// Start a transfer and return its handle
    async fn enqueue(&self, request: GatewayRequest) -> crate::Result<DownloadHandle>;

    /// Cancel a transfer and forget it; unknown handles are ignored
    async fn cancel(&self, handle: DownloadHandle) -> crate::Result<()>;

    /// Current status of one transfer, `None` if the gateway no longer knows it
    async fn query(&self, handle: DownloadHandle) -> crate::Result<Option<TransferStatus>>;

    /// Current status of every transfer the gateway knows about
    async fn query_all(&self) -> crate::Result<Vec<(DownloadHandle, TransferStatus)>>;

    /// Subscribe to "transfer finished" signals
    ///
    /// Gateways without push notifications return `None`; the Progress Monitor still
    /// detects terminal states by polling.
    fn subscribe_finished(&self) -> Option<broadcast::Receiver<DownloadHandle>> {
        None
    }
}
