//! Gateway-native reason codes, their text form, and failure classification

use super::traits::GatewayStatus;
use crate::error::{ErrorCode, TaskFailure};

/// Failure reason: unclassified error
pub const ERROR_UNKNOWN: i32 = 1000;
/// Failure reason: storage problem that fits no other code
pub const ERROR_FILE_ERROR: i32 = 1001;
/// Failure reason: HTTP code the service cannot handle
pub const ERROR_UNHANDLED_HTTP_CODE: i32 = 1002;
/// Failure reason: error receiving or processing data
pub const ERROR_HTTP_DATA_ERROR: i32 = 1004;
/// Failure reason: redirect limit hit
pub const ERROR_TOO_MANY_REDIRECTS: i32 = 1005;
/// Failure reason: out of space
pub const ERROR_INSUFFICIENT_SPACE: i32 = 1006;
/// Failure reason: storage device missing
pub const ERROR_DEVICE_NOT_FOUND: i32 = 1007;
/// Failure reason: interrupted transfer cannot be resumed
pub const ERROR_CANNOT_RESUME: i32 = 1008;
/// Failure reason: destination already exists
pub const ERROR_FILE_ALREADY_EXISTS: i32 = 1009;

/// Pause reason: waiting to retry after a network error
pub const PAUSED_WAITING_TO_RETRY: i32 = 1;
/// Pause reason: waiting for connectivity
pub const PAUSED_WAITING_FOR_NETWORK: i32 = 2;
/// Pause reason: too large for a mobile network, waiting for Wi-Fi
pub const PAUSED_QUEUED_FOR_WIFI: i32 = 3;
/// Pause reason: unknown
pub const PAUSED_UNKNOWN: i32 = 4;

/// Message attached to [`ErrorCode::CannotResume`] failures
pub const CANNOT_RESUME_MESSAGE: &str = "ERROR_CANNOT_RESUME - Unable to resume download. \
     This may occur with large files due to download service limitations. \
     Try restarting the download.";

/// Text used when the gateway no longer knows a handle
pub const COULD_NOT_FIND: &str = "COULD_NOT_FIND";

fn is_http_status(reason: i32) -> bool {
    (400..600).contains(&reason)
}

/// Stable text form of a raw `(status, reason)` pair
///
/// Only `Paused` and `Failed` carry a meaningful reason; other statuses render as
/// `UNKNOWN`.
pub fn reason_text(status: GatewayStatus, reason: i32) -> String {
    let text = match status {
        GatewayStatus::Failed => match reason {
            ERROR_CANNOT_RESUME => "ERROR_CANNOT_RESUME",
            ERROR_DEVICE_NOT_FOUND => "ERROR_DEVICE_NOT_FOUND",
            ERROR_FILE_ALREADY_EXISTS => "ERROR_FILE_ALREADY_EXISTS",
            ERROR_FILE_ERROR => "ERROR_FILE_ERROR",
            ERROR_HTTP_DATA_ERROR => "ERROR_HTTP_DATA_ERROR",
            ERROR_INSUFFICIENT_SPACE => "ERROR_INSUFFICIENT_SPACE",
            ERROR_TOO_MANY_REDIRECTS => "ERROR_TOO_MANY_REDIRECTS",
            ERROR_UNHANDLED_HTTP_CODE => "ERROR_UNHANDLED_HTTP_CODE",
            code if is_http_status(code) => return format!("HTTP_{code}"),
            _ => "ERROR_UNKNOWN",
        },
        GatewayStatus::Paused => match reason {
            PAUSED_QUEUED_FOR_WIFI => "PAUSED_QUEUED_FOR_WIFI",
            PAUSED_UNKNOWN => "PAUSED_UNKNOWN",
            PAUSED_WAITING_FOR_NETWORK => "PAUSED_WAITING_FOR_NETWORK",
            PAUSED_WAITING_TO_RETRY => "PAUSED_WAITING_TO_RETRY",
            _ => "UNKNOWN",
        },
        _ => "UNKNOWN",
    };
    text.to_string()
}

/// Classify a failed transfer's reason into the stable taxonomy
pub fn classify_failure(reason: i32) -> ErrorCode {
    match reason {
        ERROR_INSUFFICIENT_SPACE => ErrorCode::StorageFull,
        ERROR_HTTP_DATA_ERROR => ErrorCode::NetworkError,
        ERROR_FILE_ALREADY_EXISTS => ErrorCode::FileAlreadyExists,
        ERROR_DEVICE_NOT_FOUND => ErrorCode::FileNotFound,
        ERROR_CANNOT_RESUME => ErrorCode::CannotResume,
        ERROR_TOO_MANY_REDIRECTS => ErrorCode::TooManyRedirects,
        ERROR_UNHANDLED_HTTP_CODE => ErrorCode::UnhandledResponseCode,
        401 | 403 => ErrorCode::PermissionDenied,
        404 | 410 => ErrorCode::FileNotFound,
        code if is_http_status(code) => ErrorCode::UnhandledResponseCode,
        _ => ErrorCode::Unknown,
    }
}

/// Full failure (code and message) for a transfer the gateway reported as failed
pub fn failure_for(reason: i32) -> TaskFailure {
    let code = classify_failure(reason);
    let message = if code == ErrorCode::CannotResume {
        CANNOT_RESUME_MESSAGE.to_string()
    } else {
        reason_text(GatewayStatus::Failed, reason)
    };
    TaskFailure::new(code, message)
}
