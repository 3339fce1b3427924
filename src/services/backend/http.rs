//! HTTP client for the transport backend

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::TransportBackend;
use crate::defaults::DEFAULT_BACKEND_TIMEOUT_SECONDS;
use crate::error::BackendError;
use crate::types::{
    CreateRouteRequest, CreatedRoute, Driver, PersistedRoute, ReorderRouteRequest,
    StopPositionUpdate, UnassignedSchedule, Vehicle,
};

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. "http://localhost:8080/api"
    pub base_url: String,
    /// Optional bearer token
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout_seconds: DEFAULT_BACKEND_TIMEOUT_SECONDS,
        }
    }
}

/// Body of `PUT /routes/{id}/stops/order`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopOrderBody<'a> {
    stops: &'a [StopPositionUpdate],
}

pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, BackendError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .authorize(self.client.get(&url).query(query))
            .send()
            .await?;
        decode(check_status(response).await?).await
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Backend returned {}: {}", status, body);
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl TransportBackend for HttpBackend {
    async fn unassigned_schedules(&self, date: NaiveDate) -> Result<Vec<UnassignedSchedule>, BackendError> {
        self.get_json("/schedules/unassigned", &[("date", date.to_string())])
            .await
    }

    async fn routes(&self, date: NaiveDate) -> Result<Vec<PersistedRoute>, BackendError> {
        self.get_json("/routes", &[("date", date.to_string())]).await
    }

    async fn vehicles(&self) -> Result<Vec<Vehicle>, BackendError> {
        self.get_json("/vehicles", &[]).await
    }

    async fn drivers(&self) -> Result<Vec<Driver>, BackendError> {
        self.get_json("/drivers", &[]).await
    }

    async fn create_route(&self, request: &CreateRouteRequest) -> Result<CreatedRoute, BackendError> {
        let url = self.url("/routes");
        debug!("POST {} ({} stops)", url, request.stops.len());
        let response = self
            .authorize(self.client.post(&url).json(request))
            .send()
            .await?;
        decode(check_status(response).await?).await
    }

    async fn reorder_route(&self, request: &ReorderRouteRequest) -> Result<(), BackendError> {
        let url = self.url(&format!("/routes/{}/stops/order", request.route_id));
        debug!("PUT {}", url);
        let body = StopOrderBody { stops: &request.stops };
        let response = self
            .authorize(self.client.put(&url).json(&body))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "HttpBackend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = BackendConfig::new("http://backend:8080/api/");
        assert_eq!(config.base_url, "http://backend:8080/api");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_url_joins_path() {
        let backend = HttpBackend::new(BackendConfig::new("http://backend:8080/api")).unwrap();
        assert_eq!(backend.url("/routes"), "http://backend:8080/api/routes");
    }

    #[test]
    fn test_stop_order_body_shape() {
        let stops = vec![StopPositionUpdate { stop_id: Uuid::nil(), position: 2 }];
        let json = serde_json::to_value(StopOrderBody { stops: &stops }).unwrap();
        assert_eq!(json["stops"][0]["position"], 2);
        assert!(json["stops"][0].get("stopId").is_some());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let mut config = BackendConfig::new("http://127.0.0.1:9");
        config.timeout_seconds = 2;
        let backend = HttpBackend::new(config).unwrap();
        let err = backend.vehicles().await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_)));
    }
}
