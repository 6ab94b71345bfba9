//! Shared HTTP plumbing for provider adapters.

use riskscout_core::SearchError;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) const USER_AGENT: &str = "Riskscout/0.3";

/// Build a client for `provider`. The guarded wrapper enforces the call
/// timeout; this one bounds the connection phase.
pub(crate) fn client(provider: &str, timeout: Duration) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SearchError::Request {
            provider: provider.to_string(),
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Send `request` and decode a JSON body, mapping transport and status
/// failures onto `SearchError`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, SearchError> {
    let response = request.send().await.map_err(|e| SearchError::Request {
        provider: provider.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SearchError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }

    response.json::<T>().await.map_err(|e| SearchError::Parse {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

/// Read an API key from `env_var`, treating blank values as missing.
pub(crate) fn api_key_from_env(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
