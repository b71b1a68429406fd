//! Remote Data Gateway for the collection API.
//!
//! Four independent, stateless operations. No retries happen here; callers decide
//! when to ask again.

use crate::{
    error::GatewayError,
    model::{ChartData, CollectionAck, OptionSample, SystemStatus},
};
use async_trait::async_trait;
use derive_more::Display;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoints of the collection API.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum Endpoint {
    #[display("GET /api/chart-data")]
    ChartData,
    #[display("GET /api/latest-data")]
    LatestData,
    #[display("GET /api/status")]
    Status,
    #[display("POST /api/trigger-collection")]
    TriggerCollection,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::ChartData => "/api/chart-data",
            Endpoint::LatestData => "/api/latest-data",
            Endpoint::Status => "/api/status",
            Endpoint::TriggerCollection => "/api/trigger-collection",
        }
    }
}

/// Read and write operations against the collection API.
#[async_trait]
pub trait OptionsGateway: Send + Sync {
    /// Samples for the trailing `hours` window.
    async fn fetch_chart_series(&self, hours: u32) -> Result<ChartData, GatewayError>;

    /// Most recent sample per option type.
    async fn fetch_latest_snapshot(&self) -> Result<Vec<OptionSample>, GatewayError>;

    /// Collection scheduler status. Callers treat failures as non-critical.
    async fn fetch_system_status(&self) -> Result<SystemStatus, GatewayError>;

    /// Ask the backend to start an out-of-band collection cycle.
    async fn trigger_collection(&self) -> Result<CollectionAck, GatewayError>;
}

/// [`OptionsGateway`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    http: Client,
}

impl HttpGateway {
    /// Create a gateway using [`DEFAULT_REQUEST_TIMEOUT`].
    pub fn new(base_url: &Url) -> Result<Self, GatewayError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &Url, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Config(error.to_string()))?;

        Ok(Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    async fn get_json<T>(&self, endpoint: Endpoint, query: &[(&str, String)]) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(endpoint);
        debug!(%endpoint, %url, "requesting");

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|error| GatewayError::classify(endpoint, error))?;

        let response = ensure_success(endpoint, response)?;

        response
            .json::<T>()
            .await
            .map_err(|error| GatewayError::classify(endpoint, error))
    }
}

#[async_trait]
impl OptionsGateway for HttpGateway {
    async fn fetch_chart_series(&self, hours: u32) -> Result<ChartData, GatewayError> {
        self.get_json(Endpoint::ChartData, &[("hours", hours.to_string())])
            .await
    }

    async fn fetch_latest_snapshot(&self) -> Result<Vec<OptionSample>, GatewayError> {
        self.get_json(Endpoint::LatestData, &[]).await
    }

    async fn fetch_system_status(&self) -> Result<SystemStatus, GatewayError> {
        self.get_json(Endpoint::Status, &[]).await
    }

    async fn trigger_collection(&self) -> Result<CollectionAck, GatewayError> {
        let endpoint = Endpoint::TriggerCollection;
        let url = self.url(endpoint);
        debug!(%endpoint, %url, "requesting");

        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|error| GatewayError::classify(endpoint, error))?;

        let response = ensure_success(endpoint, response)?;
        let status_code = response.status().as_u16();

        // Body is informational only, a missing or non-JSON body is still an ack
        let body = response
            .text()
            .await
            .map_err(|error| GatewayError::classify(endpoint, error))?;

        Ok(CollectionAck {
            status_code,
            message: ack_message(&body),
        })
    }
}

fn ensure_success(endpoint: Endpoint, response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::Server {
            endpoint,
            status: status.as_u16(),
        })
    }
}

fn ack_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    value
        .get("message")
        .and_then(|message| message.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let base = Url::parse("http://localhost:8000/").unwrap();
        let gateway = HttpGateway::new(&base).unwrap();

        assert_eq!(gateway.base_url(), "http://localhost:8000");
        assert_eq!(
            gateway.url(Endpoint::ChartData),
            "http://localhost:8000/api/chart-data"
        );
    }

    #[test]
    fn test_base_url_with_prefix_path() {
        let base = Url::parse("https://example.com/options").unwrap();
        let gateway = HttpGateway::new(&base).unwrap();

        assert_eq!(
            gateway.url(Endpoint::Status),
            "https://example.com/options/api/status"
        );
    }

    #[test]
    fn test_ack_message() {
        assert_eq!(
            ack_message(r#"{"message": "Collection triggered"}"#),
            Some("Collection triggered".to_string())
        );
        assert_eq!(ack_message(r#"{"status": "ok"}"#), None);
        assert_eq!(ack_message(""), None);
    }
}
