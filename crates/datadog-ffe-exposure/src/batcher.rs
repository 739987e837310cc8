// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded buffer of exposure events, flushed to the agent as one batch.
//!
//! Enqueueing never blocks and never fails: once the buffer holds `max_size`
//! events, further events are counted and discarded until the next flush.
//! A flush swaps the buffer out under the lock before any I/O, so events
//! enqueued while a request is in flight go into the next batch.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::errors::ShippingError;
use crate::exposure::{ExposureBatch, ExposureEvent, ServiceContext};
use crate::transport::ExposureTransport;

/// Default number of buffered events before new ones are dropped.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1000;

/// Result of a flush. Callers are free to ignore it.
#[derive(Debug)]
pub enum FlushOutcome {
    /// The batch with this many events was accepted by the agent.
    Sent(usize),
    /// Nothing was buffered; no request was made.
    SkippedEmpty,
    /// The batch was lost.
    Failed(ShippingError),
}

#[derive(Debug, Default)]
struct Buffer {
    events: Vec<ExposureEvent>,
    dropped: usize,
}

pub struct ExposureBatcher {
    buffer: Mutex<Buffer>,
    max_size: usize,
    context: ServiceContext,
    transport: Arc<dyn ExposureTransport>,
}

impl std::fmt::Debug for ExposureBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposureBatcher")
            .field("max_size", &self.max_size)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl ExposureBatcher {
    #[must_use]
    pub fn new(
        context: ServiceContext,
        max_size: usize,
        transport: Arc<dyn ExposureTransport>,
    ) -> Self {
        ExposureBatcher {
            buffer: Mutex::new(Buffer::default()),
            max_size,
            context,
            transport,
        }
    }

    /// Appends an event, or counts it as dropped if the buffer is full.
    pub fn enqueue(&self, event: ExposureEvent) {
        let mut buffer = self.lock();
        if buffer.events.len() < self.max_size {
            buffer.events.push(event);
        } else {
            buffer.dropped += 1;
        }
    }

    /// Sends everything buffered so far in a single request.
    ///
    /// Failures are logged at debug level and otherwise discarded; the events
    /// of a failed batch are not requeued.
    pub async fn flush(&self) -> FlushOutcome {
        let Some(batch) = self.take_batch() else {
            return FlushOutcome::SkippedEmpty;
        };

        if batch.dropped > 0 {
            debug!(
                "EXPOSURES | Dropped {} exposure events since last flush, buffer limit is {}",
                batch.dropped, self.max_size
            );
        }

        let count = batch.exposures.len();
        debug!("EXPOSURES | Flushing {count} exposure events");

        let payload = match serde_json::to_vec(&batch) {
            Ok(payload) => payload,
            Err(e) => {
                let error = ShippingError::Payload(e.to_string());
                debug!("EXPOSURES | {error}. Data dropped");
                return FlushOutcome::Failed(error);
            }
        };

        match self.transport.send(payload).await {
            Ok(()) => FlushOutcome::Sent(count),
            Err(error) => {
                debug!("EXPOSURES | Failed to send {count} exposure events: {error}");
                FlushOutcome::Failed(error)
            }
        }
    }

    /// Atomically empties the buffer and resets the drop counter, returning
    /// what was captured. `None` when the buffer was empty.
    pub fn take_batch(&self) -> Option<ExposureBatch> {
        let mut buffer = self.lock();
        if buffer.events.is_empty() {
            return None;
        }
        let taken = std::mem::take(&mut *buffer);
        Some(ExposureBatch {
            context: self.context.clone(),
            exposures: taken.events,
            dropped: taken.dropped,
        })
    }

    /// Discards buffered events and the drop counter without sending.
    pub fn clear(&self) {
        *self.lock() = Buffer::default();
    }

    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.lock().events.len()
    }

    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.lock().dropped
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    // A panic while holding the lock cannot leave the buffer half-updated, so
    // a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
