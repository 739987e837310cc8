// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exposure records and the JSON payload shipped to the agent's EVP proxy.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Attributes of the subject a flag was evaluated for.
pub type Attributes = HashMap<String, Value>;

/// What the flag evaluation engine decided, as far as exposure reporting cares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationDecision {
    pub do_log: bool,
    pub variant_key: Option<String>,
    pub allocation_key: Option<String>,
}

/// One subject being shown one flag variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub flag_key: String,
    pub variant_key: String,
    pub allocation_key: String,
    pub subject_id: String,
    pub attributes: Attributes,
}

impl ExposureEvent {
    /// Builds an event stamped with the current time.
    pub fn new(
        flag_key: impl Into<String>,
        variant_key: impl Into<String>,
        allocation_key: impl Into<String>,
        subject_id: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        ExposureEvent {
            timestamp: now_millis(),
            flag_key: flag_key.into(),
            variant_key: variant_key.into(),
            allocation_key: allocation_key.into(),
            subject_id: subject_id.into(),
            attributes,
        }
    }
}

#[derive(Serialize)]
struct KeyRef<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct SubjectRef<'a> {
    id: &'a str,
    attributes: &'a Attributes,
}

// The intake expects each key wrapped in its own object, e.g.
// `"flag": {"key": "..."}`, while the event itself stays flat.
impl Serialize for ExposureEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExposureEvent", 5)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field(
            "allocation",
            &KeyRef {
                key: &self.allocation_key,
            },
        )?;
        state.serialize_field("flag", &KeyRef { key: &self.flag_key })?;
        state.serialize_field(
            "variant",
            &KeyRef {
                key: &self.variant_key,
            },
        )?;
        state.serialize_field(
            "subject",
            &SubjectRef {
                id: &self.subject_id,
                attributes: &self.attributes,
            },
        )?;
        state.end()
    }
}

/// Service identity attached to every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceContext {
    pub service: String,
    pub env: String,
    pub version: String,
}

/// Everything captured by a single flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureBatch {
    pub context: ServiceContext,
    pub exposures: Vec<ExposureEvent>,
    /// Events discarded because the buffer was full. Diagnostic only, not sent.
    #[serde(skip)]
    pub dropped: usize,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
