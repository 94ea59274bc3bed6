//! Redirect Resolver
//!
//! Follows up to `max_hops` redirects with HEAD requests before a task is handed to the
//! gateway, so the gateway receives the final URL. Resolution never fails a submission:
//! any network error yields the original URL.

use reqwest::redirect::Policy;
use url::Url;

use crate::config::NetworkConfig;
use crate::http::header_map;
use crate::Result;

/// Bounded HEAD-based redirect follower
#[derive(Clone, Debug)]
pub struct RedirectResolver {
    client: reqwest::Client,
}

impl RedirectResolver {
    /// Create a resolver using the per-hop timeout from `network`
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(network.redirect_timeout)
            .timeout(network.redirect_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Resolve `url` through at most `max_hops` redirects
    ///
    /// `max_hops == 0` returns the input unchanged without any request. When the hop
    /// limit is reached the URL reached so far is returned and a warning logged.
    pub async fn resolve(&self, url: &str, max_hops: u32, headers: &[(String, String)]) -> String {
        if max_hops == 0 {
            return url.to_string();
        }

        match self.follow(url, max_hops, headers).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to resolve redirects, using original URL");
                url.to_string()
            }
        }
    }

    async fn follow(&self, original: &str, max_hops: u32, headers: &[(String, String)]) -> Result<String> {
        let headers = header_map(headers);
        let mut current = Url::parse(original)
            .map_err(|e| crate::Error::InvalidArgument(format!("invalid url {original}: {e}")))?;
        let mut hops = 0;

        while hops < max_hops {
            let response = self
                .client
                .head(current.clone())
                .headers(headers.clone())
                .send()
                .await?;

            if !response.status().is_redirection() {
                break;
            }

            let Some(location) = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                tracing::warn!(url = %current, "Redirect response without Location header");
                break;
            };

            let next = current.join(location).map_err(|e| {
                crate::Error::Other(format!("invalid redirect location {location}: {e}"))
            })?;
            tracing::debug!(
                hop = hops + 1,
                max_hops,
                from = %current,
                to = %next,
                "Following redirect"
            );
            current = next;
            hops += 1;
        }

        if hops >= max_hops {
            tracing::warn!(
                url = %original,
                resolved = %current,
                max_hops,
                "Reached maximum redirects"
            );
        } else {
            tracing::debug!(url = %original, resolved = %current, hops, "Resolved redirects");
        }

        Ok(current.to_string())
    }
}
