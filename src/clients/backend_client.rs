use std::fmt;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TransportError;

/// Routes exposed by the calendar agent backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    ParseIntent,
    ConversationState,
    CalendarEvents,
    RunTestCase,
    Health,
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::Chat | Endpoint::ParseIntent | Endpoint::RunTestCase => Method::POST,
            Endpoint::ConversationState | Endpoint::CalendarEvents | Endpoint::Health => {
                Method::GET
            }
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Chat => "/api/chat",
            Endpoint::ParseIntent => "/debug/parse_intent",
            Endpoint::ConversationState => "/debug/conversation_state",
            Endpoint::CalendarEvents => "/debug/calendar_events",
            Endpoint::RunTestCase => "/debug/run_test_case",
            Endpoint::Health => "/",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

/// One request in, one result out. Never retries and never caches.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Payloads are sent as JSON, so free text never has to be escaped into
    /// a URL.
    pub async fn call(
        &self,
        endpoint: Endpoint,
        payload: Option<&Value>,
    ) -> Result<Value, TransportError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.round_trip(endpoint, payload))
                .await
                .map_err(|_| {
                    warn!(%endpoint, ?limit, "backend call timed out");
                    TransportError::timeout(format!("{} exceeded {:?}", endpoint, limit))
                })?,
            None => self.round_trip(endpoint, payload).await,
        }
    }

    async fn round_trip(
        &self,
        endpoint: Endpoint,
        payload: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let url = self.url_for(endpoint);
        debug!(%endpoint, %url, "calling backend");

        let mut request = self.http.request(endpoint.method(), &url);
        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(%endpoint, error = %e, "backend unreachable");
            if e.is_timeout() {
                TransportError::timeout(e.to_string())
            } else {
                TransportError::connection(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::connection(format!("reading body failed: {}", e)))?;

        if !status.is_success() {
            warn!(%endpoint, %status, "backend returned an error status");
            return Err(TransportError::status(format!(
                "{} returned {}: {}",
                endpoint, status, text
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            TransportError::malformed(format!("{}: {}\nRaw body: {}", endpoint, e, text))
        })
    }
}
