// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Feature flag exposure reporting.
//!
//! Each flag evaluation the engine marks as loggable goes through
//! [`exposure_cache::ExposureDeduplicator`], which remembers the last assignment
//! per (flag, subject) in a bounded [`recency_cache::RecencyCache`]. New or
//! changed assignments become [`exposure::ExposureEvent`]s buffered by
//! [`batcher::ExposureBatcher`] and shipped as one JSON batch to the agent's EVP
//! proxy on flush. [`reporter::ExposureReporter`] wires the pieces together.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batcher;
pub mod config;
pub mod errors;
pub mod exposure;
pub mod exposure_cache;
pub mod logger;
pub mod recency_cache;
pub mod reporter;
pub mod transport;
