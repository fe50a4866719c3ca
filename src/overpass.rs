//! Client for the remote OSM query service.
//!
//! The Overpass API accepts an Overpass QL query as an url-encoded `data`
//! parameter and returns OSM JSON. Transient failures are retried a bounded
//! number of times with exponential backoff; client errors fail fast.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::error::AppError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Source of raw OSM JSON for an Overpass QL query.
pub trait OsmFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        ql: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

#[derive(Clone)]
pub struct OverpassClient {
    http: reqwest::Client,
    endpoint: String,
    max_attempts: u32,
    backoff: Duration,
}

impl OverpassClient {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: config.overpass_endpoint.clone(),
            max_attempts: config.fetch_max_attempts.max(1),
            backoff: Duration::from_millis(config.fetch_backoff_ms),
        })
    }

    #[instrument(skip(self, ql))]
    async fn request(&self, ql: &str) -> Result<serde_json::Value, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .http
                .get(&self.endpoint)
                .query(&[("data", ql)])
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    debug!(attempt, "overpass fetch succeeded");
                    return Ok(resp.json().await?);
                }
                Ok(resp) => {
                    let status = resp.status();
                    if retryable_status(status) && attempt < self.max_attempts {
                        warn!(%status, attempt, "overpass returned transient status, retrying");
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                        continue;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AppError::FetchExhausted {
                        attempts: attempt,
                        message: format!("overpass returned status {status}: {body}"),
                    });
                }
                Err(err) => {
                    if attempt < self.max_attempts {
                        warn!(%err, attempt, "overpass request failed, retrying");
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                        continue;
                    }
                    return Err(AppError::FetchExhausted {
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl OsmFetcher for OverpassClient {
    async fn fetch(&self, ql: &str) -> Result<serde_json::Value, AppError> {
        self.request(ql).await
    }
}

fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
