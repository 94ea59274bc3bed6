//! Task submission: validation, redirect resolution, gateway enqueue, persistence.

use std::path::Path;
use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::gateway::{GatewayRequest, Visibility};
use crate::http::request_headers;
use crate::types::{DownloadHandle, DownloadOptions, DownloadRequest, TaskConfig, TaskId};

use super::BackgroundDownloader;

/// Temporary file name the gateway writes to before relocation
///
/// `<millis & 0xfffffff>.<extension of destination>`, without the dot when the
/// destination has no extension.
pub(crate) fn destination_hint(destination: &Path, now_millis: i64) -> String {
    let stem = now_millis & 0x0fff_ffff;
    match destination.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

fn validate(request: &DownloadRequest) -> Result<()> {
    if request.id.is_empty() {
        return Err(Error::InvalidArgument("id is required".to_string()));
    }
    if request.url.is_empty() {
        return Err(Error::InvalidArgument("url is required".to_string()));
    }
    if request.destination.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("destination is required".to_string()));
    }
    if !request.destination.is_absolute() {
        return Err(Error::InvalidArgument(format!(
            "destination must be absolute: {}",
            request.destination.display()
        )));
    }
    Ok(())
}

impl BackgroundDownloader {
    /// Submit a download
    ///
    /// Validates the request, resolves redirects when `options.max_redirects > 0`, and
    /// enqueues the transfer with the gateway. The task is tracked and persisted before
    /// this returns; the begin probe and progress monitoring run in the background.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] when id, url or destination is missing, the
    ///   destination is relative, or a task with the same id is already tracked
    /// - [`Error::ShuttingDown`] after `shutdown()` started
    /// - gateway and store errors
    pub async fn submit(
        &self,
        request: DownloadRequest,
        options: DownloadOptions,
    ) -> Result<DownloadHandle> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        validate(&request)?;

        let id = TaskId::new(request.id);
        if self.maps.lock().await.handles.contains_key(&id) {
            return Err(Error::InvalidArgument(format!("task {id} already exists")));
        }

        if let Some(interval) = options.progress_interval.filter(|i| !i.is_zero()) {
            self.set_progress_interval(interval).await?;
        }
        if let Some(min_bytes) = options.progress_min_bytes.filter(|b| *b > 0) {
            self.set_progress_min_bytes(min_bytes).await?;
        }

        let headers = request_headers(&self.config.network, &options.headers);
        let url = self
            .resolver
            .resolve(&request.url, options.max_redirects, &headers)
            .await;

        let gateway_request = GatewayRequest {
            url: url.clone(),
            headers: headers.clone(),
            allow_metered: options.allow_metered,
            allow_roaming: options.allow_roaming,
            visibility: if options.notification_visible {
                Visibility::VisibleNotifyCompleted
            } else {
                Visibility::Hidden
            },
            title: options.notification_title.clone(),
            destination_hint: destination_hint(
                &request.destination,
                chrono::Utc::now().timestamp_millis(),
            ),
        };
        let handle = self.gateway.enqueue(gateway_request).await?;

        let config = TaskConfig {
            id: id.clone(),
            url,
            destination: request.destination,
            metadata: request.metadata,
            reported_begin: false,
            notification_title: options.notification_title,
        };

        let tracked = {
            let mut maps = self.maps.lock().await;
            if maps.handles.contains_key(&id) {
                Err(Error::InvalidArgument(format!("task {id} already exists")))
            } else {
                match self.db.insert_task(handle, &config).await {
                    Ok(()) => {
                        maps.track(handle, config.clone());
                        self.spawn_pipeline(&mut maps, handle, config, headers);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = tracked {
            // nothing owns the transfer; do not leave it running
            if let Err(cancel_err) = self.gateway.cancel(handle).await {
                tracing::warn!(handle = handle.0, error = %cancel_err, "Failed to cancel untracked transfer");
            }
            return Err(e);
        }

        tracing::info!(task_id = %id, handle = handle.0, "Task submitted");
        Ok(handle)
    }
}
