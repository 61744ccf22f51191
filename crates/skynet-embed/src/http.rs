//! Blocking JSON client for OpenAI-compatible endpoints with bounded retries.

use reqwest::blocking::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use skynet_core::{Error, Result};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

/// Value of the environment variable `name`, or `InvalidConfig` when unset or blank.
pub fn api_key_from_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::InvalidConfig(format!("{name} environment variable not set")))
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key: api_key.to_string(), max_retries })
    }

    /// POST `body` to `{base_url}{path}`. Transport errors, 429 and 5xx are
    /// retried with exponential backoff; other 4xx fail immediately.
    pub fn post<Req: Serialize, Resp: DeserializeOwned>(&self, path: &str, body: &Req) -> Result<Resp> {
        let url = format!("{}{}", self.base_url, path);
        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("{}: retry attempt {}/{} after {:?}", path, attempt, self.max_retries, backoff);
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            match self.client.post(&url).bearer_auth(&self.api_key).json(body).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json().map_err(|e| Error::ExternalDependency(format!("{path} response: {e}")));
                    }
                    if status.is_client_error() && status.as_u16() != 429 {
                        let text = resp.text().unwrap_or_default();
                        return Err(Error::ExternalDependency(format!("{path} HTTP {status}: {text}")));
                    }
                    last_err = format!("HTTP {status}");
                }
                Err(e) => last_err = e.to_string(),
            }
            warn!(attempt, path, error = %last_err, "request failed");
        }
        Err(Error::ExternalDependency(format!("{path} failed after {} attempts: {last_err}", self.max_retries + 1)))
    }
}
