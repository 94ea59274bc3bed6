//! Begin Probe
//!
//! One request per task lifetime that captures the response headers and the expected
//! size. The body is never read; dropping the response closes the connection.

use std::collections::HashMap;

use crate::config::NetworkConfig;
use crate::http::header_map;
use crate::Result;

/// What the begin event reports
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// Response headers, lower-case names; repeated headers keep the last value
    pub headers: HashMap<String, String>,
    /// Parsed `Content-Length`, 0 when missing or unparsable
    pub expected_bytes: u64,
}

/// Header-only HTTP probe
#[derive(Clone, Debug)]
pub struct BeginProbe {
    client: reqwest::Client,
}

impl BeginProbe {
    /// Create a probe with the connect/read timeouts from `network`
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(network.probe_connect_timeout)
            .timeout(network.probe_read_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch headers and expected size of `url`
    ///
    /// Fails on connection errors and on 4xx/5xx responses.
    pub async fn probe(&self, url: &str, headers: &[(String, String)]) -> Result<ProbeResult> {
        let response = self
            .client
            .get(url)
            .headers(header_map(headers))
            .send()
            .await?
            .error_for_status()?;

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let expected_bytes = headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        Ok(ProbeResult {
            headers,
            expected_bytes,
        })
    }
}
