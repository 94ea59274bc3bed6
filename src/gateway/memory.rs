//! In-process download gateway

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::traits::{DownloadGateway, GatewayRequest, TransferStatus};
use crate::types::DownloadHandle;
use crate::{Error, Result};

struct Transfer {
    request: Option<GatewayRequest>,
    current: TransferStatus,
    script: VecDeque<TransferStatus>,
}

#[derive(Default)]
struct State {
    next_handle: i64,
    transfers: BTreeMap<DownloadHandle, Transfer>,
    scripts: HashMap<String, Vec<TransferStatus>>,
    enqueued: Vec<(DownloadHandle, GatewayRequest)>,
    cancelled: Vec<DownloadHandle>,
    reject_enqueue: Option<String>,
}

/// Scriptable in-memory gateway
///
/// Handles are assigned sequentially from 1. Each transfer starts `Pending`; every
/// [`query`](DownloadGateway::query) advances it one step through the script registered
/// for its URL, and the last step sticks. [`query_all`](DownloadGateway::query_all)
/// observes without advancing.
///
/// Cancelling a transfer removes it, as a platform download service does.
///
/// # Examples
///
/// ```
/// use background_dl::gateway::{DownloadGateway, MemoryGateway, TransferStatus};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = MemoryGateway::new();
/// gateway.script(
///     "http://example.com/a.bin",
///     vec![TransferStatus::running(10, 100), TransferStatus::running(100, 100)],
/// );
/// let handle = gateway.insert("http://example.com/a.bin", TransferStatus::pending());
///
/// assert_eq!(gateway.query(handle).await?.unwrap().bytes_downloaded, 10);
/// assert_eq!(gateway.query(handle).await?.unwrap().bytes_downloaded, 100);
/// assert_eq!(gateway.query(handle).await?.unwrap().bytes_downloaded, 100);
/// # Ok(())
/// # }
/// ```
pub struct MemoryGateway {
    state: Mutex<State>,
    finished_tx: broadcast::Sender<DownloadHandle>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        let (finished_tx, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(State {
                next_handle: 1,
                ..State::default()
            }),
            finished_tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register the status sequence transfers of `url` will report
    ///
    /// Applies to transfers enqueued afterwards.
    pub fn script(&self, url: &str, steps: Vec<TransferStatus>) {
        self.lock().scripts.insert(url.to_string(), steps);
    }

    /// Make the next enqueue calls fail with `message`
    pub fn reject_enqueue(&self, message: Option<&str>) {
        self.lock().reject_enqueue = message.map(str::to_string);
    }

    /// Add a transfer the engine did not enqueue (e.g. one left from an earlier process)
    pub fn insert(&self, url: &str, status: TransferStatus) -> DownloadHandle {
        let mut state = self.lock();
        let handle = DownloadHandle(state.next_handle);
        state.next_handle += 1;
        let script = state.scripts.get(url).cloned().unwrap_or_default().into();
        state.transfers.insert(
            handle,
            Transfer {
                request: None,
                current: status,
                script,
            },
        );
        handle
    }

    /// Replace a transfer's status and drop the rest of its script
    pub fn set_status(&self, handle: DownloadHandle, status: TransferStatus) {
        if let Some(transfer) = self.lock().transfers.get_mut(&handle) {
            transfer.current = status;
            transfer.script.clear();
        }
    }

    /// Forget a transfer without recording a cancel, as if the service lost it
    pub fn forget(&self, handle: DownloadHandle) {
        self.lock().transfers.remove(&handle);
    }

    /// Emit the "transfer finished" signal for `handle`
    pub fn finish(&self, handle: DownloadHandle) {
        // no subscribers is fine: the monitor polls anyway
        self.finished_tx.send(handle).ok();
    }

    /// Every request enqueued so far, in order
    pub fn enqueued(&self) -> Vec<(DownloadHandle, GatewayRequest)> {
        self.lock().enqueued.clone()
    }

    /// Every handle cancelled so far, in order
    pub fn cancelled(&self) -> Vec<DownloadHandle> {
        self.lock().cancelled.clone()
    }

    /// Whether the gateway still knows `handle`
    pub fn contains(&self, handle: DownloadHandle) -> bool {
        self.lock().transfers.contains_key(&handle)
    }

    /// The request a handle was enqueued with
    pub fn request(&self, handle: DownloadHandle) -> Option<GatewayRequest> {
        self.lock()
            .transfers
            .get(&handle)
            .and_then(|t| t.request.clone())
    }
}

#[async_trait]
impl DownloadGateway for MemoryGateway {
    async fn enqueue(&self, request: GatewayRequest) -> Result<DownloadHandle> {
        let mut state = self.lock();
        if let Some(message) = &state.reject_enqueue {
            return Err(Error::Gateway(message.clone()));
        }

        let handle = DownloadHandle(state.next_handle);
        state.next_handle += 1;
        let script = state
            .scripts
            .get(&request.url)
            .cloned()
            .unwrap_or_default()
            .into();
        state.transfers.insert(
            handle,
            Transfer {
                request: Some(request.clone()),
                current: TransferStatus::pending(),
                script,
            },
        );
        state.enqueued.push((handle, request));
        Ok(handle)
    }

    async fn cancel(&self, handle: DownloadHandle) -> Result<()> {
        let mut state = self.lock();
        state.transfers.remove(&handle);
        state.cancelled.push(handle);
        Ok(())
    }

    async fn query(&self, handle: DownloadHandle) -> Result<Option<TransferStatus>> {
        let mut state = self.lock();
        Ok(state.transfers.get_mut(&handle).map(|transfer| {
            if let Some(next) = transfer.script.pop_front() {
                transfer.current = next;
            }
            transfer.current.clone()
        }))
    }

    async fn query_all(&self) -> Result<Vec<(DownloadHandle, TransferStatus)>> {
        Ok(self
            .lock()
            .transfers
            .iter()
            .map(|(handle, transfer)| (*handle, transfer.current.clone()))
            .collect())
    }

    fn subscribe_finished(&self) -> Option<broadcast::Receiver<DownloadHandle>> {
        Some(self.finished_tx.subscribe())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayStatus, Visibility};

    fn request(url: &str) -> GatewayRequest {
        GatewayRequest {
            url: url.to_string(),
            headers: vec![],
            allow_metered: true,
            allow_roaming: true,
            visibility: Visibility::Hidden,
            title: None,
            destination_hint: "1.bin".to_string(),
        }
    }

    #[tokio::test]
    async fn handles_are_sequential_and_start_pending() {
        let gateway = MemoryGateway::new();
        let a = gateway.enqueue(request("http://x/a")).await.unwrap();
        let b = gateway.enqueue(request("http://x/b")).await.unwrap();

        assert_eq!(a, DownloadHandle(1));
        assert_eq!(b, DownloadHandle(2));
        let all = gateway.query_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|(_, s)| s.status == GatewayStatus::Pending));
    }

    #[tokio::test]
    async fn query_walks_script_and_last_step_sticks() {
        let gateway = MemoryGateway::new();
        gateway.script(
            "http://x/a",
            vec![TransferStatus::running(1, 10), TransferStatus::running(5, 10)],
        );
        let handle = gateway.enqueue(request("http://x/a")).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(gateway.query(handle).await.unwrap().unwrap().bytes_downloaded);
        }
        assert_eq!(seen, vec![1, 5, 5, 5]);

        // observing everything does not advance
        let all = gateway.query_all().await.unwrap();
        assert_eq!(all[0].1.bytes_downloaded, 5);
    }

    #[tokio::test]
    async fn cancel_removes_transfer_and_is_recorded() {
        let gateway = MemoryGateway::new();
        let handle = gateway.enqueue(request("http://x/a")).await.unwrap();

        gateway.cancel(handle).await.unwrap();

        assert!(gateway.query(handle).await.unwrap().is_none());
        assert_eq!(gateway.cancelled(), vec![handle]);
        // unknown handles are ignored
        gateway.cancel(DownloadHandle(42)).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_enqueue_returns_gateway_error() {
        let gateway = MemoryGateway::new();
        gateway.reject_enqueue(Some("no storage"));

        let err = gateway.enqueue(request("http://x/a")).await.unwrap_err();
        assert!(matches!(err, Error::Gateway(ref m) if m == "no storage"));
        assert!(gateway.enqueued().is_empty());
    }

    #[tokio::test]
    async fn finish_reaches_subscribers() {
        let gateway = MemoryGateway::new();
        let mut rx = gateway.subscribe_finished().unwrap();

        gateway.finish(DownloadHandle(7));

        assert_eq!(rx.recv().await.unwrap(), DownloadHandle(7));
    }

    #[tokio::test]
    async fn set_status_overrides_script() {
        let gateway = MemoryGateway::new();
        gateway.script("http://x/a", vec![TransferStatus::running(1, 10)]);
        let handle = gateway.enqueue(request("http://x/a")).await.unwrap();

        gateway.set_status(handle, TransferStatus::failed(1008, 3, 10));

        let status = gateway.query(handle).await.unwrap().unwrap();
        assert_eq!(status.status, GatewayStatus::Failed);
        assert_eq!(status.reason, 1008);
    }
}
