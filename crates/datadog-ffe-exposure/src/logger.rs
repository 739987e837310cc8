// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Picks the log level: `DD_LOG_LEVEL` if set, else `debug` when debug
/// logging is enabled and `info` otherwise.
pub fn log_level(config: &Config, dd_log_level: Option<&str>) -> String {
    match dd_log_level.map(str::trim).filter(|level| !level.is_empty()) {
        Some(level) => level.to_lowercase(),
        None if config.debug => "debug".to_string(),
        None => "info".to_string(),
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("h2=off,hyper=off,rustls=off,{level}"))
        .unwrap_or_else(|_| EnvFilter::new("h2=off,hyper=off,rustls=off,info"))
}

/// Installs a global fmt subscriber. Returns `false` if one was already set,
/// in which case the existing subscriber is left alone.
pub fn init(config: &Config) -> bool {
    let level = log_level(config, env::var("DD_LOG_LEVEL").ok().as_deref());

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(&level))
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    let installed = tracing::subscriber::set_global_default(subscriber).is_ok();
    if installed {
        debug!("Logging subsystem enabled at level {level}");
    }
    installed
}
