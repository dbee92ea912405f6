//! HTTP fetching of monitored endpoints.
//!
//! Non-2xx responses are not errors: the status code is part of what the
//! endpoint pipeline compares between cycles. Only transport failures
//! surface as [`MonitorError::Fetch`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::FetcherConfig;
use crate::error::{MonitorError, Result};

/// Body and status of one GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub body: Vec<u8>,
    pub status_code: u16,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse>;
}

/// [`Fetcher`] over a shared `reqwest` client with a fixed user agent.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| MonitorError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MonitorError::fetch(url, e))?;
        let status_code = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| MonitorError::fetch(url, e))?
            .to_vec();

        info!(
            url,
            body_length = body.len(),
            status_code,
            "fetched endpoint"
        );
        Ok(FetchResponse { body, status_code })
    }
}
