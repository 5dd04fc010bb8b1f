//! Typed backend resources and their query constructors

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use urlencoding::encode;

use crate::client::RequestClient;
use crate::error::RequestOutcome;
use crate::io::Method;
use crate::query::ResourceQuery;

/// A server in the backend inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// An entry in the purchase queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub product: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub attempts: u32,
}

/// A monitoring subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSubscription {
    pub id: String,
    pub product: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
}

/// Account data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub currency: String,
}

/// One line of the backend log tail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: String,
    pub message: String,
}

/// A location where a product can be ordered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Price request for a product at a location with add-ons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub product: String,
    pub location: String,
    #[serde(default)]
    pub addons: Vec<String>,
}

/// Price preview returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
}

/// Acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Resources a consumer can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Servers,
    Queue,
    Monitors,
    Account,
    Logs,
}

impl ResourceKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ResourceKind::Servers => "/api/servers",
            ResourceKind::Queue => "/api/queue",
            ResourceKind::Monitors => "/api/monitors",
            ResourceKind::Account => "/api/account",
            ResourceKind::Logs => "/api/logs",
        }
    }

    /// Polling interval matched to how quickly the resource changes
    pub fn default_interval(&self) -> Duration {
        match self {
            ResourceKind::Queue => Duration::from_secs(5),
            ResourceKind::Logs => Duration::from_secs(10),
            ResourceKind::Servers | ResourceKind::Monitors => Duration::from_secs(30),
            ResourceKind::Account => Duration::from_secs(60),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Servers => write!(f, "servers"),
            ResourceKind::Queue => write!(f, "queue"),
            ResourceKind::Monitors => write!(f, "monitors"),
            ResourceKind::Account => write!(f, "account"),
            ResourceKind::Logs => write!(f, "logs"),
        }
    }
}

/// Typed calls against the automation backend
#[derive(Debug, Clone)]
pub struct Backend {
    client: RequestClient,
}

impl Backend {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }

    pub async fn servers(&self) -> RequestOutcome<Vec<Server>> {
        self.get(ResourceKind::Servers.endpoint()).await
    }

    pub async fn queue(&self) -> RequestOutcome<Vec<QueueItem>> {
        self.get(ResourceKind::Queue.endpoint()).await
    }

    pub async fn monitors(&self) -> RequestOutcome<Vec<MonitorSubscription>> {
        self.get(ResourceKind::Monitors.endpoint()).await
    }

    pub async fn account(&self) -> RequestOutcome<AccountInfo> {
        self.get(ResourceKind::Account.endpoint()).await
    }

    pub async fn logs(&self, limit: usize) -> RequestOutcome<Vec<LogEntry>> {
        self.get(&format!("{}?limit={}", ResourceKind::Logs.endpoint(), limit))
            .await
    }

    pub async fn locations(&self, product: &str) -> RequestOutcome<Vec<Location>> {
        self.get(&format!("/api/products/{}/locations", encode(product)))
            .await
    }

    pub async fn price(&self, request: &PriceRequest) -> RequestOutcome<PriceQuote> {
        let body = serde_json::to_value(request).unwrap_or(Value::Null);
        self.client.send("/api/price", Method::Post, Some(&body)).await
    }

    pub async fn submit_order(&self, request: &PriceRequest) -> RequestOutcome<OrderReceipt> {
        let body = serde_json::to_value(request).unwrap_or(Value::Null);
        self.client
            .send(ResourceKind::Queue.endpoint(), Method::Post, Some(&body))
            .await
    }

    pub async fn delete_queue_item(&self, id: &str) -> RequestOutcome<Value> {
        self.client
            .send(
                &format!("{}/{}", ResourceKind::Queue.endpoint(), encode(id)),
                Method::Delete,
                None,
            )
            .await
    }

    pub async fn set_monitor_enabled(&self, id: &str, enabled: bool) -> RequestOutcome<Value> {
        let body = serde_json::json!({ "enabled": enabled });
        self.client
            .send(
                &format!("{}/{}", ResourceKind::Monitors.endpoint(), encode(id)),
                Method::Patch,
                Some(&body),
            )
            .await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> RequestOutcome<T> {
        self.client.send(endpoint, Method::Get, None).await
    }

    pub fn servers_query(&self) -> ResourceQuery<(), Vec<Server>> {
        let backend = self.clone();
        ResourceQuery::new("servers", (), move |_| {
            let backend = backend.clone();
            async move { backend.servers().await }
        })
    }

    pub fn queue_query(&self) -> ResourceQuery<(), Vec<QueueItem>> {
        let backend = self.clone();
        ResourceQuery::new("queue", (), move |_| {
            let backend = backend.clone();
            async move { backend.queue().await }
        })
    }

    pub fn monitors_query(&self) -> ResourceQuery<(), Vec<MonitorSubscription>> {
        let backend = self.clone();
        ResourceQuery::new("monitors", (), move |_| {
            let backend = backend.clone();
            async move { backend.monitors().await }
        })
    }

    pub fn account_query(&self) -> ResourceQuery<(), AccountInfo> {
        let backend = self.clone();
        ResourceQuery::new("account", (), move |_| {
            let backend = backend.clone();
            async move { backend.account().await }
        })
    }

    pub fn logs_query(&self, limit: usize) -> ResourceQuery<usize, Vec<LogEntry>> {
        let backend = self.clone();
        ResourceQuery::new("logs", limit, move |limit| {
            let backend = backend.clone();
            async move { backend.logs(limit).await }
        })
    }

    /// Locations for the selected product; no product means no locations
    pub fn locations_query(&self, product: Option<String>) -> ResourceQuery<Option<String>, Vec<Location>> {
        let backend = self.clone();
        ResourceQuery::new("locations", product, move |product: Option<String>| {
            let backend = backend.clone();
            async move {
                match product {
                    Some(product) => backend.locations(&product).await,
                    None => Ok(Vec::new()),
                }
            }
        })
    }
}
