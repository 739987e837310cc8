// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use core::time::Duration;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::time::Instant;
use tracing::debug;

use crate::errors::{CreationError, ShippingError};

/// Path of the exposures intake behind the agent's EVP proxy.
pub const EXPOSURES_PATH: &str = "/evp_proxy/v2/api/v2/exposures";
pub const EVP_SUBDOMAIN_HEADER: &str = "x-datadog-evp-subdomain";
pub const EVP_SUBDOMAIN: &str = "event-platform-intake";

/// Ships one serialized batch. Implementations must honour their own
/// deadlines; the batcher never retries.
#[async_trait]
pub trait ExposureTransport: Send + Sync {
    async fn send(&self, payload: Vec<u8>) -> Result<(), ShippingError>;
}

/// POSTs batches to the local agent.
#[derive(Debug, Clone)]
pub struct AgentTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl AgentTransport {
    pub fn new(
        agent_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, CreationError> {
        let client = build_client(connect_timeout, request_timeout)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(EVP_SUBDOMAIN_HEADER),
            HeaderValue::from_static(EVP_SUBDOMAIN),
        );

        Ok(AgentTransport {
            client,
            url: exposures_url(agent_url),
            headers,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ExposureTransport for AgentTransport {
    async fn send(&self, payload: Vec<u8>) -> Result<(), ShippingError> {
        let time = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(payload)
            .send()
            .await
            .map_err(|e| ShippingError::Destination(e.to_string()))?;
        let elapsed = time.elapsed();

        let status = response.status();
        if status.is_success() {
            debug!(
                "EXPOSURES | Sent batch in {} ms to {}",
                elapsed.as_millis(),
                self.url
            );
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ShippingError::Status(status, body))
    }
}

/// Builds a reqwest client bounded by a connect timeout and a total request
/// timeout. Uses rustls TLS.
pub fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<reqwest::Client, CreationError> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| CreationError::HttpClient(e.to_string()))
}

fn exposures_url(agent_url: &str) -> String {
    format!("{}{EXPOSURES_PATH}", agent_url.trim_end_matches('/'))
}
