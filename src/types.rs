//! Core types for background-dl

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ErrorCode;

/// Client-chosen task identifier, stable across process restarts
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for TaskId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier the download gateway assigns to one enqueued transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadHandle(pub i64);

impl DownloadHandle {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for DownloadHandle {
    fn from(handle: i64) -> Self {
        Self(handle)
    }
}

impl std::fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for DownloadHandle {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for DownloadHandle {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for DownloadHandle {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let handle = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(handle))
    }
}

/// Observed state of a task, derived from the gateway's raw status at query time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Queued or transferring
    Running,
    /// Paused by the gateway (waiting for network, retry, ...)
    Suspended,
    /// Failed; the task is on its way out
    Canceling,
    /// Transfer finished successfully
    Completed,
}

impl TaskState {
    /// Convert integer state code to TaskState
    pub fn from_i32(state: i32) -> Self {
        match state {
            0 => TaskState::Running,
            1 => TaskState::Suspended,
            2 => TaskState::Canceling,
            3 => TaskState::Completed,
            _ => TaskState::Canceling,
        }
    }

    /// Convert TaskState to the integer code hosts receive
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskState::Running => 0,
            TaskState::Suspended => 1,
            TaskState::Canceling => 2,
            TaskState::Completed => 3,
        }
    }

    /// Whether no further polling happens in this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Canceling | TaskState::Completed)
    }
}

/// Identity and static parameters of one download
///
/// This is what the task store persists per handle. Only `reported_begin` ever changes
/// after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Client-chosen id
    pub id: TaskId,
    /// Source URL (after redirect resolution, if enabled)
    pub url: String,
    /// Absolute final path of the downloaded file
    pub destination: PathBuf,
    /// Opaque client data, passed through untouched
    pub metadata: String,
    /// Set once the begin event has been emitted; never resets
    pub reported_begin: bool,
    /// Title handed to the gateway for its notification
    pub notification_title: Option<String>,
}

/// A client download request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Client-chosen unique id (required)
    pub id: String,
    /// Source URL (required)
    pub url: String,
    /// Absolute final path (required)
    pub destination: PathBuf,
    /// Opaque client data
    #[serde(default)]
    pub metadata: String,
}

impl DownloadRequest {
    /// Create a request with empty metadata
    pub fn new(id: impl Into<String>, url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            destination: destination.into(),
            metadata: String::new(),
        }
    }

    /// Attach opaque client metadata
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }
}

/// Per-submission options
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Extra request headers, applied after the defaults
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Allow the transfer over metered networks (default: true)
    #[serde(default = "default_true")]
    pub allow_metered: bool,

    /// Allow the transfer while roaming (default: true)
    #[serde(default = "default_true")]
    pub allow_roaming: bool,

    /// Show the gateway's notification for this transfer (default: false)
    #[serde(default)]
    pub notification_visible: bool,

    /// Title of the gateway's notification
    #[serde(default)]
    pub notification_title: Option<String>,

    /// Redirect hops to resolve before enqueueing (0 = hand the URL over unchanged)
    #[serde(default)]
    pub max_redirects: u32,

    /// Replace the global progress interval (persisted)
    #[serde(default)]
    pub progress_interval: Option<Duration>,

    /// Replace the global progress byte threshold (persisted)
    #[serde(default)]
    pub progress_min_bytes: Option<u64>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            allow_metered: true,
            allow_roaming: true,
            notification_visible: false,
            notification_title: None,
            max_redirects: 0,
            progress_interval: None,
            progress_min_bytes: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Point-in-time view of one tracked task, as returned by `list_active`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task id
    pub id: TaskId,
    /// Opaque client data
    pub metadata: String,
    /// Current state
    pub state: TaskState,
    /// Bytes written so far
    pub bytes_downloaded: u64,
    /// Expected total, 0 when unknown
    pub bytes_total: u64,
    /// Fraction complete (0.0-1.0), 0 when the total is unknown
    pub percent: f64,
}

/// One entry of a batched progress event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Task id
    pub id: TaskId,
    /// Bytes written so far
    pub bytes_downloaded: u64,
    /// Expected total, 0 when unknown
    pub bytes_total: u64,
}

/// Events emitted to the host application
///
/// Per task the order is always `Begin`, then `Progress` entries, then exactly one of
/// `Complete` or `Failed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Response headers and expected size, at most once per task
    Begin {
        /// Task id
        id: TaskId,
        /// Response headers from the begin probe
        headers: HashMap<String, String>,
        /// Content-Length, 0 when unknown
        expected_bytes: u64,
    },

    /// Throttled progress for every task with a pending sample
    Progress {
        /// One entry per task, never empty
        reports: Vec<ProgressReport>,
    },

    /// File relocated to its destination
    Complete {
        /// Task id
        id: TaskId,
        /// Final path
        location: PathBuf,
        /// Bytes observed at completion
        bytes_downloaded: u64,
        /// Total observed at completion, 0 when unknown
        bytes_total: u64,
    },

    /// Task failed
    Failed {
        /// Task id
        id: TaskId,
        /// Stable failure code
        error_code: ErrorCode,
        /// Free-text detail
        error_message: String,
    },

    /// The engine finished a graceful shutdown
    Shutdown,
}
