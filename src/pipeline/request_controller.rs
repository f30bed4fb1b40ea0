// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One in-flight transaction per public key.
//!
//! Two transactions signed concurrently with the same key would race on
//! the proof-of-work and spam counters. A request that finds its key busy
//! waits up to `max_attempts` x `retry_delay` before giving up.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::context::RequestContext;
use crate::error::ApiError;

pub struct RequestController {
    in_flight: Mutex<HashSet<String>>,
    max_attempts: u32,
    retry_delay: Duration,
}

/// Exclusive use of a public key, released on drop.
#[derive(Debug)]
pub struct KeyLease<'a> {
    controller: &'a RequestController,
    public_key: String,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        self.controller.keys().remove(&self.public_key);
    }
}

impl std::fmt::Debug for RequestController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestController")
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl RequestController {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            in_flight: Mutex::new(HashSet::new()),
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked.
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_use(&self, public_key: &str) -> bool {
        self.keys().contains(public_key)
    }

    pub async fn acquire(
        &self,
        ctx: &RequestContext,
        public_key: &str,
    ) -> Result<KeyLease<'_>, ApiError> {
        for attempt in 1..=self.max_attempts {
            if self.keys().insert(public_key.to_string()) {
                return Ok(KeyLease {
                    controller: self,
                    public_key: public_key.to_string(),
                });
            }
            if attempt == self.max_attempts {
                break;
            }
            debug!(public_key, attempt, "Public key busy, waiting");
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(ApiError::request_interrupted()),
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
        Err(ApiError::request_not_permitted(format!(
            "this public key \"{public_key}\" is already in use, retry later"
        )))
    }
}
