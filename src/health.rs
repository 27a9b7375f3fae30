//! Backend reachability probe.
//!
//! The analysis service answers `GET /` with a small JSON banner. Probing it
//! over plain HTTP tells a misconfigured endpoint apart from a service that is
//! up but refusing WebSocket upgrades.

use std::time::Duration;

use log::info;
use reqwest::Url;
use serde::Deserialize;

use crate::error::{SessionError, SessionResult};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendBanner {
    pub message: String,
}

/// HTTP root of the service behind a `ws://` or `wss://` endpoint.
pub fn http_base_from_ws(endpoint: &str) -> SessionResult<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| SessionError::config("endpoint", endpoint, e.to_string()))?;

    let scheme = match url.scheme() {
        "ws" => "http",
        "wss" => "https",
        other => {
            return Err(SessionError::config(
                "endpoint",
                endpoint,
                format!("unsupported scheme {}", other),
            ));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| SessionError::config("endpoint", endpoint, "cannot switch to http"))?;
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Fetch the service banner.
pub async fn probe_backend(endpoint: &str) -> SessionResult<BackendBanner> {
    let url = http_base_from_ws(endpoint)?;
    let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;

    let banner = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| SessionError::connection(e.to_string()).with_endpoint(url.as_str()))?
        .error_for_status()?
        .json::<BackendBanner>()
        .await?;

    info!("backend at {} says: {}", url, banner.message);
    Ok(banner)
}
