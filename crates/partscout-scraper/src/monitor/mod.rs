//! Per-run request monitoring and block detection.
//!
//! The monitor is purely observational: it records every fetch attempt,
//! classifies failures that look like the site pushing back, and turns the
//! recent history into alerts. Acting on those alerts is left to callers.

mod alerts;
mod metrics;
mod sink;

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use partscout_core::Category;
use serde::Serialize;

use crate::error::ScraperError;

pub use alerts::{recommendations_for, Alert, AlertKind, BlockingReport, Severity};
pub use metrics::{RequestOutcome, SessionMetrics, WindowStats};
pub use sink::JsonlSink;

use metrics::{as_f64, ratio};

/// Outcomes kept for windowed statistics. Older entries are evicted first.
pub const HISTORY_CAPACITY: usize = 1_000;

const BLOCKED_STATUS_CODES: [u16; 4] = [403, 429, 503, 999];

/// Failures this fast usually come from a cached block page.
const SUSPICIOUS_DURATION_SECS: (f64, f64) = (0.01, 0.1);

const BLOCKED_PHRASES: [&str; 9] = [
    "access denied",
    "rate limited",
    "too many requests",
    "blocked",
    "captcha",
    "cloudflare",
    "verification",
    "please wait",
    "retry after",
];

/// Monitor shared between the session pool and the orchestrator.
pub type SharedMonitor = Arc<Mutex<BlockingMonitor>>;

/// `true` if a failed outcome looks like the site is blocking us.
///
/// Successful outcomes are never classified as blocked.
#[must_use]
pub fn is_likely_blocked(outcome: &RequestOutcome) -> bool {
    if outcome.success {
        return false;
    }
    if outcome
        .status_code
        .is_some_and(|s| BLOCKED_STATUS_CODES.contains(&s))
    {
        return true;
    }
    let (min, max) = SUSPICIOUS_DURATION_SECS;
    if (min..=max).contains(&outcome.duration_secs) {
        return true;
    }
    outcome.error.as_deref().is_some_and(|e| {
        let lower = e.to_lowercase();
        BLOCKED_PHRASES.iter().any(|p| lower.contains(p))
    })
}

#[derive(Debug, Clone)]
struct Recorded {
    outcome: RequestOutcome,
    blocked: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    total: u64,
    successful: u64,
}

impl Tally {
    fn add(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successful += 1;
        }
    }

    fn performance(self) -> Performance {
        Performance {
            total_requests: self.total,
            success_rate: ratio(self.successful, self.total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Performance {
    pub total_requests: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSummary {
    pub session_duration_minutes: f64,
    pub total_requests: u64,
    pub success_rate: f64,
    pub block_rate: f64,
    pub avg_request_secs: f64,
    pub requests_per_minute: f64,
    pub vendors: BTreeMap<String, Performance>,
    pub categories: BTreeMap<Category, Performance>,
}

#[derive(Debug)]
pub struct BlockingMonitor {
    history: VecDeque<Recorded>,
    metrics: SessionMetrics,
    vendors: BTreeMap<String, Tally>,
    categories: BTreeMap<Category, Tally>,
    sink: Option<JsonlSink>,
}

impl Default for BlockingMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockingMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    #[must_use]
    pub fn started_at(start: DateTime<Utc>) -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            metrics: SessionMetrics::new(start),
            vendors: BTreeMap::new(),
            categories: BTreeMap::new(),
            sink: None,
        }
    }

    /// Creates a monitor that appends every outcome to a JSON Lines file.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::MonitorSink`] if the file cannot be opened.
    pub fn with_sink(path: &Path) -> Result<Self, ScraperError> {
        let mut monitor = Self::new();
        monitor.sink = Some(JsonlSink::open(path)?);
        Ok(monitor)
    }

    #[must_use]
    pub fn shared(self) -> SharedMonitor {
        Arc::new(Mutex::new(self))
    }

    pub fn record(&mut self, outcome: RequestOutcome) {
        let blocked = is_likely_blocked(&outcome);

        self.metrics.total_requests += 1;
        self.metrics.total_duration_secs += outcome.duration_secs;
        if outcome.success {
            self.metrics.successful_requests += 1;
        } else {
            self.metrics.failed_requests += 1;
            if blocked {
                self.metrics.blocked_requests += 1;
                tracing::warn!(
                    vendor = %outcome.vendor,
                    category = %outcome.category,
                    url = %outcome.url,
                    status = ?outcome.status_code,
                    error = outcome.error.as_deref().unwrap_or(""),
                    "possible blocking detected"
                );
            }
        }

        self.vendors
            .entry(outcome.vendor.clone())
            .or_default()
            .add(outcome.success);
        self.categories
            .entry(outcome.category)
            .or_default()
            .add(outcome.success);

        if let Some(sink) = self.sink.as_mut() {
            sink.append(&outcome);
        }

        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(Recorded { outcome, blocked });
    }

    #[must_use]
    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn window_stats(&self, minutes: u32) -> WindowStats {
        self.window_stats_at(Utc::now(), minutes)
    }

    /// Statistics over outcomes newer than `now - minutes`.
    #[must_use]
    pub fn window_stats_at(&self, now: DateTime<Utc>, minutes: u32) -> WindowStats {
        if minutes == 0 {
            return WindowStats::empty(minutes);
        }
        let cutoff = now - chrono::Duration::minutes(i64::from(minutes));
        let recent: Vec<&Recorded> = self
            .history
            .iter()
            .filter(|r| r.outcome.timestamp > cutoff)
            .collect();
        if recent.is_empty() {
            return WindowStats::empty(minutes);
        }

        let total = recent.len() as u64;
        let successful = recent.iter().filter(|r| r.outcome.success).count() as u64;
        let blocked = recent.iter().filter(|r| r.blocked).count() as u64;
        let duration: f64 = recent.iter().map(|r| r.outcome.duration_secs).sum();

        WindowStats {
            minutes,
            requests: recent.len(),
            success_rate: ratio(successful, total),
            failure_rate: ratio(total - successful, total),
            block_rate: ratio(blocked, total),
            avg_duration_secs: duration / as_f64(total),
            requests_per_minute: as_f64(total) / f64::from(minutes),
        }
    }

    #[must_use]
    pub fn detect_patterns(&self) -> BlockingReport {
        self.detect_patterns_at(Utc::now())
    }

    #[must_use]
    pub fn detect_patterns_at(&self, now: DateTime<Utc>) -> BlockingReport {
        BlockingReport::from_windows(
            now,
            self.window_stats_at(now, 5),
            self.window_stats_at(now, 10),
            self.window_stats_at(now, 30),
        )
    }

    #[must_use]
    pub fn summary(&self) -> MonitorSummary {
        self.summary_at(Utc::now())
    }

    #[must_use]
    pub fn summary_at(&self, now: DateTime<Utc>) -> MonitorSummary {
        let elapsed_ms = (now - self.metrics.session_start).num_milliseconds().max(0);
        #[allow(clippy::cast_precision_loss)]
        let minutes = elapsed_ms as f64 / 60_000.0;
        let requests_per_minute = if minutes > 0.0 {
            as_f64(self.metrics.total_requests) / minutes
        } else {
            0.0
        };

        MonitorSummary {
            session_duration_minutes: minutes,
            total_requests: self.metrics.total_requests,
            success_rate: self.metrics.success_rate(),
            block_rate: self.metrics.block_rate(),
            avg_request_secs: self.metrics.avg_request_secs(),
            requests_per_minute,
            vendors: self
                .vendors
                .iter()
                .map(|(v, t)| (v.clone(), t.performance()))
                .collect(),
            categories: self
                .categories
                .iter()
                .map(|(c, t)| (*c, t.performance()))
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "../monitor_test.rs"]
mod tests;
