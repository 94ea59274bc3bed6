use super::test_helpers::*;
use super::*;
use crate::error::{Error, ErrorCode};
use crate::gateway::{MemoryGateway, TransferStatus, Visibility};
use crate::types::{DownloadOptions, DownloadRequest, TaskState};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod submit;

/// Server answering the begin probe for `/file.bin` with a body of `len` bytes
async fn file_server(len: usize) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"v1\"")
                .set_body_bytes(vec![0u8; len]),
        )
        .mount(&server)
        .await;
    server
}

fn file_url(server: &MockServer) -> String {
    format!("{}/file.bin", server.uri())
}

fn request(id: &str, url: &str, dir: &Path) -> DownloadRequest {
    DownloadRequest::new(id, url, dir.join("out").join(format!("{id}.bin")))
}

/// Bytes of every progress entry for `id`, in delivery order
fn progress_of(events: &[Event], id: &str) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress { reports } => Some(reports),
            _ => None,
        })
        .flatten()
        .filter(|report| report.id == id)
        .map(|report| report.bytes_downloaded)
        .collect()
}

fn is_begin(event: &Event, id: &str) -> bool {
    matches!(event, Event::Begin { id: begun, .. } if begun == id)
}
