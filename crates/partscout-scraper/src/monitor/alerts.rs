use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::metrics::WindowStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighFailureRate,
    HighBlockRate,
    DecliningPerformance,
    HighRequestRate,
}

impl AlertKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HighFailureRate => "high_failure_rate",
            AlertKind::HighBlockRate => "high_block_rate",
            AlertKind::DecliningPerformance => "declining_performance",
            AlertKind::HighRequestRate => "high_request_rate",
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::HighBlockRate => Severity::Critical,
            AlertKind::HighFailureRate => Severity::High,
            AlertKind::DecliningPerformance | AlertKind::HighRequestRate => Severity::Medium,
        }
    }

    fn recommendations(self) -> &'static [&'static str] {
        match self {
            AlertKind::HighBlockRate => &[
                "Switch to conservative mode",
                "Increase delays between requests",
                "Rotate sessions more frequently",
                "Consider using proxy rotation",
            ],
            AlertKind::HighFailureRate => &[
                "Check internet connection",
                "Verify target websites are accessible",
                "Increase request timeouts",
            ],
            AlertKind::HighRequestRate => &[
                "Reduce concurrency",
                "Increase base delays",
                "Implement longer pauses between batches",
            ],
            AlertKind::DecliningPerformance => &[
                "Monitor for gradual blocking",
                "Consider taking a break",
                "Rotate to a different IP or session",
            ],
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    fn new(kind: AlertKind, message: String) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message,
        }
    }
}

/// Output of one pattern check.
#[derive(Debug, Clone, Serialize)]
pub struct BlockingReport {
    pub generated_at: DateTime<Utc>,
    pub alerts: Vec<Alert>,
    pub last_5m: WindowStats,
    pub last_10m: WindowStats,
    pub last_30m: WindowStats,
    pub recommendations: Vec<String>,
}

impl BlockingReport {
    pub(crate) fn from_windows(
        generated_at: DateTime<Utc>,
        last_5m: WindowStats,
        last_10m: WindowStats,
        last_30m: WindowStats,
    ) -> Self {
        let alerts = evaluate(&last_5m, &last_30m);
        let recommendations = recommendations_for(&alerts);
        Self {
            generated_at,
            alerts,
            last_5m,
            last_10m,
            last_30m,
            recommendations,
        }
    }

    #[must_use]
    pub fn has(&self, kind: AlertKind) -> bool {
        self.alerts.iter().any(|a| a.kind == kind)
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Pacing multiplier to hand to the rate limiter: `2.0` when blocking is
    /// suspected, `1.5` for any other alert, `1.0` otherwise.
    #[must_use]
    pub fn suggested_pressure(&self) -> f64 {
        if self.has(AlertKind::HighBlockRate) {
            2.0
        } else if self.alerts.is_empty() {
            1.0
        } else {
            1.5
        }
    }
}

fn evaluate(last_5m: &WindowStats, last_30m: &WindowStats) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if last_5m.failure_rate > 0.5 {
        alerts.push(Alert::new(
            AlertKind::HighFailureRate,
            format!(
                "Failure rate: {:.1}% in last 5 minutes",
                last_5m.failure_rate * 100.0
            ),
        ));
    }

    if last_5m.requests > 0 && last_5m.block_rate >= 0.3 {
        alerts.push(Alert::new(
            AlertKind::HighBlockRate,
            format!(
                "Block rate: {:.1}% in last 5 minutes",
                last_5m.block_rate * 100.0
            ),
        ));
    }

    if last_5m.requests >= 5 && last_5m.success_rate < last_30m.success_rate * 0.7 {
        alerts.push(Alert::new(
            AlertKind::DecliningPerformance,
            "Success rate declining compared to 30-minute average".to_string(),
        ));
    }

    if last_5m.requests_per_minute > 20.0 {
        alerts.push(Alert::new(
            AlertKind::HighRequestRate,
            format!("Request rate: {:.1}/min", last_5m.requests_per_minute),
        ));
    }

    alerts
}

/// Deduplicated advice for a set of alerts, in a stable order.
#[must_use]
pub fn recommendations_for(alerts: &[Alert]) -> Vec<String> {
    let kinds: BTreeSet<AlertKind> = alerts.iter().map(|a| a.kind).collect();
    let mut seen = BTreeSet::new();
    kinds
        .into_iter()
        .flat_map(|k| k.recommendations().iter().copied())
        .filter(|r| seen.insert(*r))
        .map(str::to_string)
        .collect()
}
