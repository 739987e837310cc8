// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Deduplication of flag exposures per (flag, subject).
//!
//! Both the key and the value are a pair of strings packed into one string as
//! `"<byte length of first>:<first>:<second>"`. Only the first component is
//! length-prefixed: the second is whatever follows, so either component may
//! contain `:` without creating an ambiguous boundary.
//!
//! Adding a third component would need every component but the last to be
//! length-prefixed; this two-field layout does not generalize as is.

use crate::recency_cache::{RecencyCache, DEFAULT_CAPACITY};

/// Packs two optional strings into a single unambiguous string. `None` is
/// encoded as the empty string.
pub fn encode_pair(first: Option<&str>, second: Option<&str>) -> String {
    let first = first.unwrap_or_default();
    let second = second.unwrap_or_default();
    format!("{}:{first}:{second}", first.len())
}

/// Inverse of [`encode_pair`]. Input that was not produced by the encoder is
/// returned whole as the first component with an empty second component.
pub fn decode_pair(encoded: &str) -> (String, String) {
    let decoded = encoded.split_once(':').and_then(|(len, rest)| {
        let len = len.parse::<usize>().ok()?;
        let first = rest.get(..len)?;
        let second = rest.get(len..)?.strip_prefix(':')?;
        Some((first.to_string(), second.to_string()))
    });
    decoded.unwrap_or_else(|| (encoded.to_string(), String::new()))
}

/// Remembers the last (variant, allocation) reported for each (flag, subject)
/// and tells the caller when an evaluation is worth reporting again.
#[derive(Debug)]
pub struct ExposureDeduplicator {
    cache: RecencyCache<String, String>,
}

impl Default for ExposureDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ExposureDeduplicator {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        ExposureDeduplicator {
            cache: RecencyCache::new(capacity),
        }
    }

    /// Records an evaluation and returns `true` when it is the first one seen
    /// for this (flag, subject) or when the variant or allocation changed.
    ///
    /// The entry is refreshed even on an exact repeat, so pairs that are
    /// evaluated constantly stay cached instead of aging out.
    pub fn add<'a>(
        &mut self,
        flag_key: impl Into<Option<&'a str>>,
        subject_id: impl Into<Option<&'a str>>,
        variant_key: impl Into<Option<&'a str>>,
        allocation_key: impl Into<Option<&'a str>>,
    ) -> bool {
        let key = encode_pair(flag_key.into(), subject_id.into());
        let value = encode_pair(variant_key.into(), allocation_key.into());
        match self.cache.put(key, value.clone()) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    /// Returns the last (variant, allocation) recorded for (flag, subject).
    pub fn get<'a>(
        &mut self,
        flag_key: impl Into<Option<&'a str>>,
        subject_id: impl Into<Option<&'a str>>,
    ) -> Option<(String, String)> {
        let key = encode_pair(flag_key.into(), subject_id.into());
        self.cache.get(key.as_str()).map(|value| decode_pair(value))
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
