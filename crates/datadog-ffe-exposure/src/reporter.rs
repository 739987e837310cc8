// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide handle tying deduplication and batching together.
//!
//! The host builds one `ExposureReporter` (usually behind an `Arc`) and hands it
//! to whatever evaluates flags. `reset` puts it back in its freshly built state
//! for test harnesses.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::batcher::{ExposureBatcher, FlushOutcome};
use crate::config::Config;
use crate::errors::CreationError;
use crate::exposure::{Attributes, EvaluationDecision, ExposureEvent};
use crate::exposure_cache::ExposureDeduplicator;
use crate::transport::{AgentTransport, ExposureTransport};

#[derive(Debug)]
pub struct ExposureReporter {
    dedup: Mutex<ExposureDeduplicator>,
    batcher: ExposureBatcher,
}

impl ExposureReporter {
    /// Builds a reporter shipping to the agent named in `config`.
    pub fn new(config: &Config) -> Result<Self, CreationError> {
        config.validate()?;
        let transport = AgentTransport::new(
            &config.agent_url,
            config.connect_timeout,
            config.request_timeout,
        )?;
        debug!(
            "EXPOSURES | Reporting exposures to {} (cache capacity {}, buffer size {})",
            transport.url(),
            config.cache_capacity,
            config.max_buffer_size
        );
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Reads the configuration from the environment, then builds the reporter.
    pub fn from_env() -> Result<Self, CreationError> {
        Self::new(&Config::from_env()?)
    }

    /// Builds a reporter around an arbitrary transport.
    #[must_use]
    pub fn with_transport(config: &Config, transport: Arc<dyn ExposureTransport>) -> Self {
        ExposureReporter {
            dedup: Mutex::new(ExposureDeduplicator::new(config.cache_capacity)),
            batcher: ExposureBatcher::new(
                config.service_context(),
                config.max_buffer_size,
                transport,
            ),
        }
    }

    /// Handles one flag evaluation. Returns `true` if an exposure event was
    /// queued, which happens only when the engine asked for it to be logged and
    /// the (flag, subject) pair is new or its assignment changed.
    pub fn record(
        &self,
        flag_key: &str,
        subject_id: &str,
        decision: &EvaluationDecision,
        attributes: Attributes,
    ) -> bool {
        if !decision.do_log {
            return false;
        }

        let variant_key = decision.variant_key.as_deref();
        let allocation_key = decision.allocation_key.as_deref();
        if !self
            .lock_dedup()
            .add(flag_key, subject_id, variant_key, allocation_key)
        {
            return false;
        }

        self.batcher.enqueue(ExposureEvent::new(
            flag_key,
            variant_key.unwrap_or_default(),
            allocation_key.unwrap_or_default(),
            subject_id,
            attributes,
        ));
        true
    }

    pub async fn flush(&self) -> FlushOutcome {
        self.batcher.flush().await
    }

    /// Forgets every remembered exposure and discards buffered events.
    pub fn reset(&self) {
        self.lock_dedup().clear();
        self.batcher.clear();
    }

    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.batcher.buffer_count()
    }

    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.batcher.dropped_count()
    }

    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.lock_dedup().size()
    }

    /// Flushes every `interval` until `cancel` fires, then flushes one last
    /// time so nothing buffered is left behind.
    pub fn start_periodic_flush(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        self.flush().await;
                        break;
                    }
                    _ = ticker.tick() => {
                        self.flush().await;
                    }
                }
            }
            debug!("EXPOSURES | Periodic flush stopped");
        })
    }

    fn lock_dedup(&self) -> MutexGuard<'_, ExposureDeduplicator> {
        self.dedup.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::tests::RecordingTransport;
    use serde_json::json;
    use std::collections::HashMap;

    fn decision(variant: &str, allocation: &str) -> EvaluationDecision {
        EvaluationDecision {
            do_log: true,
            variant_key: Some(variant.to_string()),
            allocation_key: Some(allocation.to_string()),
        }
    }

    fn reporter(config: &Config) -> (ExposureReporter, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let reporter = ExposureReporter::with_transport(config, transport.clone());
        (reporter, transport)
    }

    #[test]
    fn test_record_deduplicates() {
        let (reporter, _) = reporter(&Config::default());
        let control = decision("control", "alloc1");

        assert!(reporter.record("flag1", "user1", &control, Attributes::new()));
        assert!(!reporter.record("flag1", "user1", &control, Attributes::new()));
        let treatment = decision("treatment", "alloc1");
        assert!(reporter.record("flag1", "user1", &treatment, Attributes::new()));

        assert_eq!(reporter.buffer_count(), 2);
        assert_eq!(reporter.cache_size(), 1);
    }

    #[test]
    fn test_record_skips_when_not_logged() {
        let (reporter, _) = reporter(&Config::default());
        let skipped = EvaluationDecision {
            do_log: false,
            ..decision("on", "a")
        };
        assert!(!reporter.record("flag", "user", &skipped, Attributes::new()));
        assert_eq!(reporter.cache_size(), 0);
        assert_eq!(reporter.buffer_count(), 0);

        // Not remembered, so the first logged evaluation still counts.
        assert!(reporter.record("flag", "user", &decision("on", "a"), Attributes::new()));
    }

    #[tokio::test]
    async fn test_missing_keys_are_sent_as_empty_strings() {
        let (reporter, transport) = reporter(&Config::default());
        let decision = EvaluationDecision {
            do_log: true,
            variant_key: None,
            allocation_key: None,
        };
        assert!(reporter.record("flag", "", &decision, Attributes::new()));
        reporter.flush().await;

        let sent = transport.sent();
        let exposure = &sent[0]["exposures"][0];
        assert_eq!(exposure["variant"], json!({ "key": "" }));
        assert_eq!(exposure["allocation"], json!({ "key": "" }));
        assert_eq!(exposure["subject"]["id"], "");
    }

    #[tokio::test]
    async fn test_flush_ships_context_and_attributes() {
        let config = Config {
            service: "web".to_string(),
            env: "prod".to_string(),
            version: "1.0".to_string(),
            ..Default::default()
        };
        let (reporter, transport) = reporter(&config);
        let attributes = HashMap::from([("country".to_string(), json!("FR"))]);
        reporter.record("flag", "user", &decision("on", "a"), attributes);

        assert!(matches!(reporter.flush().await, FlushOutcome::Sent(1)));
        let sent = transport.sent();
        assert_eq!(
            sent[0]["context"],
            json!({ "service": "web", "env": "prod", "version": "1.0" })
        );
        assert_eq!(
            sent[0]["exposures"][0]["subject"]["attributes"],
            json!({ "country": "FR" })
        );
    }

    #[test]
    fn test_buffer_limit_from_config() {
        let config = Config {
            max_buffer_size: 3,
            ..Default::default()
        };
        let (reporter, _) = reporter(&config);
        for n in 0..5 {
            let flag = format!("flag-{n}");
            reporter.record(&flag, "user", &decision("on", "a"), Attributes::new());
        }
        assert_eq!(reporter.buffer_count(), 3);
        assert_eq!(reporter.dropped_count(), 2);
        // Dropped events are still remembered as reported.
        assert_eq!(reporter.cache_size(), 5);
    }

    #[test]
    fn test_reset() {
        let (reporter, _) = reporter(&Config::default());
        let on = decision("on", "a");
        reporter.record("flag", "user", &on, Attributes::new());
        reporter.reset();

        assert_eq!(reporter.cache_size(), 0);
        assert_eq!(reporter.buffer_count(), 0);
        assert!(reporter.record("flag", "user", &on, Attributes::new()));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config {
            agent_url: "localhost:8126".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ExposureReporter::new(&config),
            Err(CreationError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_periodic_flush_drains_on_cancel() {
        let (reporter, transport) = reporter(&Config::default());
        let reporter = Arc::new(reporter);
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&reporter)
            .start_periodic_flush(Duration::from_secs(3600), cancel.clone());

        reporter.record("flag", "user", &decision("on", "a"), Attributes::new());
        cancel.cancel();
        handle.await.expect("flush task panicked");

        assert_eq!(reporter.buffer_count(), 0);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_periodic_flush_ticks() {
        let (reporter, transport) = reporter(&Config::default());
        let reporter = Arc::new(reporter);
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&reporter)
            .start_periodic_flush(Duration::from_millis(10), cancel.clone());

        reporter.record("flag", "user", &decision("on", "a"), Attributes::new());
        let sent = tokio::time::timeout(Duration::from_secs(1), async {
            while transport.sent().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(sent.is_ok(), "timed out before periodic flush");

        cancel.cancel();
        handle.await.expect("flush task panicked");
        assert_eq!(transport.sent().len(), 1);
    }
}
