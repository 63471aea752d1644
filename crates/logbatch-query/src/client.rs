//! HTTP client for the logs-query REST API.

use crate::error::{QueryError, Result};
use crate::service::{QueryResponse, QueryService, ServiceError};
use async_trait::async_trait;
use logbatch_core::TimeRange;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default public endpoint of the logs-query API
pub const DEFAULT_ENDPOINT: &str = "https://api.loganalytics.io";

/// Connection settings for [`LogsQueryClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the query API
    pub endpoint: String,
    /// Bearer token sent with each request
    pub token: Option<String>,
    /// Client-side request timeout
    pub request_timeout: Duration,
    /// Server-side execution timeout requested through `Prefer: wait=`
    pub server_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            request_timeout: Duration::from_secs(660),
            server_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ServiceError,
}

/// Query client that posts queries to `{endpoint}/v1/workspaces/{id}/query`
pub struct LogsQueryClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    server_timeout_secs: u64,
}

impl LogsQueryClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(QueryError::Config("Query endpoint is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token,
            server_timeout_secs: config.server_timeout.as_secs().max(1),
        })
    }

    fn query_url(&self, workspace_id: &str) -> String {
        format!("{}/v1/workspaces/{}/query", self.base_url, workspace_id)
    }
}

#[async_trait]
impl QueryService for LogsQueryClient {
    async fn query(&self, workspace_id: &str, query: &str, range: TimeRange) -> Result<QueryResponse> {
        let body = serde_json::json!({
            "query": query,
            "timespan": range.to_timespan(),
        });

        let mut request = self
            .client
            .post(self.query_url(workspace_id))
            .header("Prefer", format!("wait={}", self.server_timeout_secs))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => QueryError::Service {
                    status: status.as_u16(),
                    error: envelope.error,
                },
                Err(_) => QueryError::Server {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let response: QueryResponse = response
            .json()
            .await
            .map_err(|e| QueryError::InvalidResponse(e.to_string()))?;

        debug!(
            "Query over {} returned {} table(s) ({}) in {:?}",
            range,
            response.tables.len(),
            response.status(),
            start.elapsed()
        );

        Ok(response)
    }
}
