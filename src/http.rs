//! Request header assembly shared by gateway requests, redirect hops and the begin probe

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

use crate::config::NetworkConfig;

/// Headers for one outgoing request: defaults first, then the caller's
///
/// `User-Agent` is only added when the caller did not supply one (compared
/// case-insensitively). Caller headers are sorted by name so the result is stable.
pub fn request_headers(
    network: &NetworkConfig,
    caller: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Connection".to_string(), "keep-alive".to_string()),
        ("Keep-Alive".to_string(), network.keep_alive.clone()),
    ];
    if !caller
        .keys()
        .any(|name| name.eq_ignore_ascii_case("user-agent"))
    {
        headers.push(("User-Agent".to_string(), network.user_agent.clone()));
    }

    let mut extra: Vec<_> = caller
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    extra.sort();
    headers.extend(extra);
    headers
}

/// Convert header pairs for reqwest; later pairs replace earlier ones with the same name
///
/// Pairs that are not valid HTTP are skipped.
pub fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => {
                tracing::debug!(header = %name, "Skipping invalid request header");
            }
        }
    }
    map
}
