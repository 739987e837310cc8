// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Invalid or inconsistent exposure writer configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure to build the pieces of the exposure pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Reasons a batch never made it to the agent. These are logged and dropped,
/// never returned to the code that evaluated the flag.
#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    #[error("Failed to serialize exposure payload: {0}")]
    Payload(String),
    #[error("Agent responded with status {0}: {1}")]
    Status(StatusCode, String),
    #[error("Failed to reach agent: {0}")]
    Destination(String),
}
