use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::auth::AuthManager;
use crate::error::TwitchResult;
use crate::types::Metrics;

/// Status and body of an upstream response, detached from the transport.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Authenticated GET against the Helix API.
#[async_trait]
pub trait ApiGet: Send + Sync {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> TwitchResult<ApiResponse>;
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: AuthManager,
    metrics: Metrics,
}

impl ApiClient {
    pub fn new(http: Client, base_url: impl Into<String>, auth: AuthManager, metrics: Metrics) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            metrics,
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ApiGet for ApiClient {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> TwitchResult<ApiResponse> {
        let auth = self.auth.authorization().await?;

        let request = self
            .http
            .get(self.url_for(path))
            .query(query)
            .header("Client-Id", auth.client_id)
            .header("Authorization", format!("Bearer {}", auth.bearer))
            .build()?;

        debug!(method = %request.method(), url = %request.url(), "making request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        self.metrics
            .upstream_requests_total
            .with_label_values(&[path, status.as_str()])
            .inc();

        if status == StatusCode::UNAUTHORIZED {
            // the failed request is not retried; only later calls see a fresh token
            warn!("got 401 response - invalidating bearer token");
            self.auth.invalidate().await;
        }

        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}
