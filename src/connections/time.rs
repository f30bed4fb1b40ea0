// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use chrono::{DateTime, Utc};

/// Source of the current time, for session expiry.
pub trait TimeService: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeService for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
