//! Seam to the OS-level download service
//!
//! The engine never moves bytes itself. Transfers are handed to a [`DownloadGateway`],
//! which exposes only enqueue, cancel, query, and a best-effort "transfer finished"
//! signal. Everything the engine knows about a transfer comes from polling [`query`].
//!
//! ## Implementations
//!
//! - Host bindings implement [`DownloadGateway`] over the platform service.
//! - [`MemoryGateway`]: in-process, scriptable implementation for embedding tests and
//!   simulations.
//!
//! [`query`]: DownloadGateway::query

mod memory;
pub mod reason;
mod traits;

pub use memory::MemoryGateway;
pub use reason::{classify_failure, reason_text};
pub use traits::{DownloadGateway, GatewayRequest, GatewayStatus, TransferStatus, Visibility};
