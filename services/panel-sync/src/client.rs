//! Request client: builds one backend call, stamps auth headers and
//! normalizes every failure into an [`ErrorInfo`]

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ErrorInfo, RequestOutcome};
use crate::io::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::settings::ConfigProvider;

/// Header carrying the configured secret
pub const IDENTITY_HEADER: &str = "X-API-Key";
/// Header carrying the send time in epoch milliseconds
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

const CONTENT_TYPE_JSON: (&str, &str) = ("Content-Type", "application/json");

/// Selects which timeout applies to a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Regular data fetches and mutations
    Data,
    /// The lightweight health probe
    Probe,
}

/// Per-class request timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub data: Duration,
    pub probe: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            data: Duration::from_secs(30),
            probe: Duration::from_secs(5),
        }
    }
}

impl RequestTimeouts {
    pub fn for_class(&self, class: RequestClass) -> Duration {
        match class {
            RequestClass::Data => self.data,
            RequestClass::Probe => self.probe,
        }
    }
}

/// Issues backend calls against the currently configured address
#[derive(Clone)]
pub struct RequestClient {
    http: Arc<dyn HttpClient>,
    settings: Arc<dyn ConfigProvider>,
    timeouts: RequestTimeouts,
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl RequestClient {
    pub fn new(http: Arc<dyn HttpClient>, settings: Arc<dyn ConfigProvider>) -> Self {
        Self {
            http,
            settings,
            timeouts: RequestTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RequestTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> RequestTimeouts {
        self.timeouts
    }

    /// Build the outgoing request from the settings as they are right now
    pub fn build_request(&self, endpoint: &str, method: Method, body: Option<&Value>) -> HttpRequest {
        let backend = self.settings.backend();

        let mut headers = vec![(
            CONTENT_TYPE_JSON.0.to_string(),
            CONTENT_TYPE_JSON.1.to_string(),
        )];
        if backend.has_secret() {
            headers.push((IDENTITY_HEADER.to_string(), backend.secret_key.clone()));
            headers.push((TIMESTAMP_HEADER.to_string(), current_epoch_ms().to_string()));
        }

        HttpRequest {
            method,
            url: format!("{}{}", backend.base_address, endpoint),
            headers,
            body: body.map(Value::to_string),
        }
    }

    /// Send a data request and parse the JSON response body as `T`
    pub async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> RequestOutcome<T> {
        let response = self
            .execute(endpoint, method, body, RequestClass::Data)
            .await?;

        if !response.is_success() {
            let message = extract_error_message(response.status, &response.body);
            tracing::debug!("{} {} -> {}: {}", method, endpoint, response.status, message);
            return Err(ErrorInfo::http(response.status, message));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            tracing::debug!("{} {} returned invalid JSON: {}", method, endpoint, e);
            ErrorInfo::parse(response.status, e)
        })
    }

    /// Probe an endpoint for reachability. The body is not interpreted.
    pub async fn probe(&self, endpoint: &str) -> RequestOutcome<()> {
        let response = self
            .execute(endpoint, Method::Get, None, RequestClass::Probe)
            .await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ErrorInfo::http(
                response.status,
                extract_error_message(response.status, &response.body),
            ))
        }
    }

    async fn execute(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
        class: RequestClass,
    ) -> RequestOutcome<HttpResponse> {
        let request = self.build_request(endpoint, method, body);
        let limit = self.timeouts.for_class(class);

        match tokio::time::timeout(limit, self.http.send(&request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                tracing::debug!("{} {} unreachable: {}", method, request.url, e);
                Err(e.into())
            }
            Err(_) => {
                tracing::debug!("{} {} timed out after {:?}", method, request.url, limit);
                Err(ErrorInfo::timeout(limit.as_millis()))
            }
        }
    }
}

/// Error text for a non-2xx response: `message`, then `error`, then the status
pub fn extract_error_message(status: u16, body: &str) -> String {
    let field = |value: &Value, name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| field(&value, "message").or_else(|| field(&value, "error")))
        .unwrap_or_else(|| format!("HTTP {}", status))
}

pub(crate) fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
