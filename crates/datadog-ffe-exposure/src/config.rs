// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use crate::batcher::DEFAULT_MAX_BUFFER_SIZE;
use crate::errors::ConfigError;
use crate::exposure::ServiceContext;
use crate::recency_cache::DEFAULT_CAPACITY;

pub const DEFAULT_AGENT_HOST: &str = "localhost";
pub const DEFAULT_AGENT_PORT: u16 = 8126;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for exposure deduplication and shipping. Read once when the
/// reporter is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub service: String,
    pub env: String,
    pub version: String,
    /// Enables debug logging of flush outcomes
    pub debug: bool,
    /// Base URL of the agent, without the EVP proxy path
    pub agent_url: String,
    /// Number of (flag, subject) pairs remembered for deduplication
    pub cache_capacity: usize,
    /// Number of events buffered between flushes
    pub max_buffer_size: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: String::new(),
            env: String::new(),
            version: String::new(),
            debug: false,
            agent_url: agent_url(None, None, None),
            cache_capacity: DEFAULT_CAPACITY,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let service = env::var("DD_SERVICE").unwrap_or_default();
        let dd_env = env::var("DD_ENV").unwrap_or_default();
        let version = env::var("DD_VERSION").unwrap_or_default();
        let debug = env::var("DD_TRACE_DEBUG")
            .map(|val| parse_bool(&val))
            .unwrap_or(false);

        let url_override = env::var("DD_TRACE_AGENT_URL").ok();
        let host = env::var("DD_AGENT_HOST").ok();
        let port = env::var("DD_TRACE_AGENT_PORT")
            .ok()
            .and_then(|port| port.trim().parse::<u16>().ok());

        let config = Self {
            service,
            env: dd_env,
            version,
            debug,
            agent_url: agent_url(url_override.as_deref(), host.as_deref(), port),
            ..Default::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.agent_url.starts_with("http://") || self.agent_url.starts_with("https://")) {
            return Err(ConfigError::InvalidConfig(format!(
                "Agent URL '{}' must use the http or https scheme",
                self.agent_url
            )));
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "Exposure cache capacity must be greater than 0".to_string(),
            ));
        }

        if self.max_buffer_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Exposure buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn service_context(&self) -> ServiceContext {
        ServiceContext {
            service: self.service.clone(),
            env: self.env.clone(),
            version: self.version.clone(),
        }
    }
}

/// Resolves the agent base URL: an explicit override wins, otherwise
/// `http://<host>:<port>` with the usual defaults.
pub fn agent_url(url_override: Option<&str>, host: Option<&str>, port: Option<u16>) -> String {
    if let Some(url) = url_override.map(str::trim).filter(|url| !url.is_empty()) {
        return url.trim_end_matches('/').to_string();
    }

    let host = host
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .unwrap_or(DEFAULT_AGENT_HOST);
    let port = port.unwrap_or(DEFAULT_AGENT_PORT);

    // Bare IPv6 literals need brackets to be used in a URL authority.
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{host}]:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}

fn parse_bool(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "true" | "1")
}
