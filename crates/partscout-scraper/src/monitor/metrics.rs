use std::time::Duration;

use chrono::{DateTime, Utc};
use partscout_core::Category;
use serde::{Deserialize, Serialize};

/// One fetch attempt, as seen by the blocking monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub url: String,
    pub vendor: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time of the attempt, in seconds.
    pub duration_secs: f64,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub content_length: Option<u64>,
}

impl RequestOutcome {
    #[must_use]
    pub fn success(
        url: impl Into<String>,
        vendor: impl Into<String>,
        category: Category,
        duration: Duration,
        status_code: u16,
        content_length: Option<u64>,
    ) -> Self {
        Self {
            url: url.into(),
            vendor: vendor.into(),
            category,
            timestamp: Utc::now(),
            duration_secs: duration.as_secs_f64(),
            success: true,
            status_code: Some(status_code),
            error: None,
            content_length,
        }
    }

    #[must_use]
    pub fn failure(
        url: impl Into<String>,
        vendor: impl Into<String>,
        category: Category,
        duration: Duration,
        status_code: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            vendor: vendor.into(),
            category,
            timestamp: Utc::now(),
            duration_secs: duration.as_secs_f64(),
            success: false,
            status_code,
            error: Some(error.into()),
            content_length: None,
        }
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Cumulative counters for one monitor's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMetrics {
    pub session_start: DateTime<Utc>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub blocked_requests: u64,
    pub total_duration_secs: f64,
}

impl SessionMetrics {
    #[must_use]
    pub fn new(session_start: DateTime<Utc>) -> Self {
        Self {
            session_start,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            blocked_requests: 0,
            total_duration_secs: 0.0,
        }
    }

    #[must_use]
    pub fn success_rate(&self) -> f64 {
        ratio(self.successful_requests, self.total_requests)
    }

    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        ratio(self.failed_requests, self.total_requests)
    }

    #[must_use]
    pub fn block_rate(&self) -> f64 {
        ratio(self.blocked_requests, self.total_requests)
    }

    #[must_use]
    pub fn avg_request_secs(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_duration_secs / as_f64(self.total_requests)
        }
    }
}

/// Aggregate over the outcomes recorded in the last `minutes` minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub minutes: u32,
    pub requests: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub block_rate: f64,
    pub avg_duration_secs: f64,
    pub requests_per_minute: f64,
}

impl WindowStats {
    #[must_use]
    pub fn empty(minutes: u32) -> Self {
        Self {
            minutes,
            requests: 0,
            success_rate: 0.0,
            failure_rate: 0.0,
            block_rate: 0.0,
            avg_duration_secs: 0.0,
            requests_per_minute: 0.0,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(n: u64) -> f64 {
    n as f64
}

pub(crate) fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        as_f64(part) / as_f64(total)
    }
}
