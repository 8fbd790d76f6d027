//! Blocking client for the scores provider's game summaries.

use crate::ingest::SummarySource;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CACHE_CONTROL, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Why a summary could not be fetched. Always scoped to one event.
#[derive(Debug)]
pub enum FetchError {
    Network(reqwest::Error, String),
    Status(StatusCode, String),
    Parsing(reqwest::Error, String),
}

impl FetchError {
    fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(e, _) if e.is_timeout() => "timeout",
            FetchError::Network(..) => "network",
            FetchError::Status(..) => "status",
            FetchError::Parsing(..) => "parse",
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(e, url) => write!(f, "Network error ({}) for {url}: {e}", self.kind()),
            FetchError::Status(status, url) => write!(f, "Provider returned {status} for {url}"),
            FetchError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Network(e, _) | FetchError::Parsing(e, _) => Some(e),
            FetchError::Status(..) => None,
        }
    }
}

/// Summary source backed by the public ESPN site API.
#[derive(Debug, Clone)]
pub struct EspnClient {
    client: Client,
    api_base: String,
}

impl EspnClient {
    /// Build a client against `api_base` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("sheet-meat-ingest/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn summary_url(&self) -> String {
        format!("{}/summary", self.api_base)
    }
}

impl SummarySource for EspnClient {
    type Error = FetchError;

    fn fetch_summary(&self, event_id: &str) -> Result<Value, FetchError> {
        let url = self.summary_url();
        let display_url = format!("{url}?event={event_id}");

        let response = self
            .client
            .get(&url)
            .query(&[("event", event_id)])
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .map_err(|e| FetchError::Network(e, display_url.clone()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status, display_url));
        }

        response
            .json::<Value>()
            .map_err(|e| FetchError::Parsing(e, display_url))
    }
}
