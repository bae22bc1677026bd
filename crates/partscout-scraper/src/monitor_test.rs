use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use partscout_core::Category;

use super::*;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn ok_at(at: DateTime<Utc>) -> RequestOutcome {
    RequestOutcome::success(
        "https://shop.example/p/1",
        "StarTech",
        Category::Cpu,
        Duration::from_millis(800),
        200,
        Some(42_000),
    )
    .at(at)
}

fn failed_at(at: DateTime<Utc>, status: Option<u16>, error: &str) -> RequestOutcome {
    RequestOutcome::failure(
        "https://shop.example/p/2",
        "StarTech",
        Category::Cpu,
        Duration::from_secs(1),
        status,
        error,
    )
    .at(at)
}

// ---------------------------------------------------------------------------
// Block classification
// ---------------------------------------------------------------------------

#[test]
fn blocked_status_codes_are_classified() {
    for status in [403, 429, 503, 999] {
        assert!(is_likely_blocked(&failed_at(t0(), Some(status), "status")));
    }
    assert!(!is_likely_blocked(&failed_at(t0(), Some(500), "server error")));
}

#[test]
fn blocked_phrases_match_case_insensitively() {
    let o = failed_at(t0(), Some(200), "Please complete the CAPTCHA");
    assert!(is_likely_blocked(&o));
    let o = failed_at(t0(), None, "Cloudflare Ray ID");
    assert!(is_likely_blocked(&o));
    let o = failed_at(t0(), None, "connection reset by peer");
    assert!(!is_likely_blocked(&o));
}

#[test]
fn suspiciously_fast_failures_are_blocked() {
    let mut o = failed_at(t0(), None, "empty body");
    o.duration_secs = 0.05;
    assert!(is_likely_blocked(&o));
    o.duration_secs = 0.005;
    assert!(!is_likely_blocked(&o));
}

#[test]
fn successes_are_never_blocked() {
    let mut o = ok_at(t0());
    o.duration_secs = 0.05;
    assert!(!is_likely_blocked(&o));
}

// ---------------------------------------------------------------------------
// Recording and windows
// ---------------------------------------------------------------------------

#[test]
fn history_is_bounded() {
    let mut monitor = BlockingMonitor::started_at(t0());
    for _ in 0..HISTORY_CAPACITY + 25 {
        monitor.record(ok_at(t0()));
    }
    assert_eq!(monitor.history_len(), HISTORY_CAPACITY);
    assert_eq!(monitor.metrics().total_requests, (HISTORY_CAPACITY + 25) as u64);
}

#[test]
fn empty_window_is_all_zeros() {
    let monitor = BlockingMonitor::started_at(t0());
    let stats = monitor.window_stats_at(t0(), 5);
    assert_eq!(stats, WindowStats::empty(5));
}

#[test]
fn window_rates_are_bounded_and_complementary() {
    let mut monitor = BlockingMonitor::started_at(t0());
    let now = t0() + chrono::Duration::minutes(1);
    for i in 0..7 {
        if i % 3 == 0 {
            monitor.record(failed_at(t0(), Some(429), "too many requests"));
        } else {
            monitor.record(ok_at(t0()));
        }
    }
    let stats = monitor.window_stats_at(now, 5);
    assert_eq!(stats.requests, 7);
    for rate in [stats.success_rate, stats.failure_rate, stats.block_rate] {
        assert!((0.0..=1.0).contains(&rate));
    }
    assert!((stats.success_rate + stats.failure_rate - 1.0).abs() < 1e-9);
    assert!((stats.requests_per_minute - 7.0 / 5.0).abs() < 1e-9);
}

#[test]
fn window_excludes_old_outcomes() {
    let mut monitor = BlockingMonitor::started_at(t0());
    monitor.record(ok_at(t0()));
    monitor.record(ok_at(t0() + chrono::Duration::minutes(20)));
    let now = t0() + chrono::Duration::minutes(22);
    assert_eq!(monitor.window_stats_at(now, 5).requests, 1);
    assert_eq!(monitor.window_stats_at(now, 30).requests, 2);
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

fn monitor_with_rate_limited(blocked: usize, total: usize) -> BlockingMonitor {
    let mut monitor = BlockingMonitor::started_at(t0());
    for i in 0..total {
        if i < blocked {
            monitor.record(failed_at(t0(), Some(429), "unexpected HTTP status 429"));
        } else {
            monitor.record(ok_at(t0()));
        }
    }
    monitor
}

#[test]
fn block_rate_of_thirty_percent_raises_critical_alert() {
    let monitor = monitor_with_rate_limited(3, 10);
    let report = monitor.detect_patterns_at(t0() + chrono::Duration::minutes(1));
    assert!(report.has(AlertKind::HighBlockRate), "alerts: {:?}", report.alerts);
    let alert = report
        .alerts
        .iter()
        .find(|a| a.kind == AlertKind::HighBlockRate)
        .unwrap();
    assert_eq!(alert.severity, Severity::Critical);
    assert!(report
        .recommendations
        .contains(&"Switch to conservative mode".to_string()));
    assert!((report.suggested_pressure() - 2.0).abs() < f64::EPSILON);
}

#[test]
fn block_rate_of_ten_percent_is_quiet() {
    let monitor = monitor_with_rate_limited(1, 10);
    let report = monitor.detect_patterns_at(t0() + chrono::Duration::minutes(1));
    assert!(!report.has(AlertKind::HighBlockRate));
    assert!(report.is_healthy());
    assert!((report.suggested_pressure() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn high_failure_rate_is_strictly_above_half() {
    let mut monitor = BlockingMonitor::started_at(t0());
    for _ in 0..5 {
        monitor.record(failed_at(t0(), Some(500), "server error"));
        monitor.record(ok_at(t0()));
    }
    let now = t0() + chrono::Duration::minutes(1);
    assert!(!monitor.detect_patterns_at(now).has(AlertKind::HighFailureRate));

    monitor.record(failed_at(t0(), Some(500), "server error"));
    let report = monitor.detect_patterns_at(now);
    assert!(report.has(AlertKind::HighFailureRate));
    assert!((report.suggested_pressure() - 1.5).abs() < f64::EPSILON);
}

#[test]
fn declining_performance_compares_to_thirty_minute_window() {
    let mut monitor = BlockingMonitor::started_at(t0());
    for _ in 0..30 {
        monitor.record(ok_at(t0()));
    }
    let later = t0() + chrono::Duration::minutes(20);
    for _ in 0..3 {
        monitor.record(ok_at(later));
    }
    for _ in 0..4 {
        monitor.record(failed_at(later, Some(500), "server error"));
    }
    let report = monitor.detect_patterns_at(later + chrono::Duration::minutes(1));
    assert!(report.has(AlertKind::DecliningPerformance), "alerts: {:?}", report.alerts);
}

#[test]
fn declining_performance_counts_a_window_of_exactly_five() {
    let mut monitor = BlockingMonitor::started_at(t0());
    for _ in 0..40 {
        monitor.record(ok_at(t0()));
    }
    let later = t0() + chrono::Duration::minutes(20);
    monitor.record(ok_at(later));
    for _ in 0..4 {
        monitor.record(failed_at(later, Some(500), "server error"));
    }
    let now = later + chrono::Duration::minutes(1);
    assert_eq!(monitor.window_stats_at(now, 5).requests, 5);
    let report = monitor.detect_patterns_at(now);
    assert!(report.has(AlertKind::DecliningPerformance), "alerts: {:?}", report.alerts);
}

#[test]
fn declining_performance_needs_five_samples() {
    let mut monitor = BlockingMonitor::started_at(t0());
    for _ in 0..40 {
        monitor.record(ok_at(t0()));
    }
    let later = t0() + chrono::Duration::minutes(20);
    for _ in 0..4 {
        monitor.record(failed_at(later, Some(500), "server error"));
    }
    let report = monitor.detect_patterns_at(later + chrono::Duration::minutes(1));
    assert!(!report.has(AlertKind::DecliningPerformance), "alerts: {:?}", report.alerts);
}

#[test]
fn request_rate_alert_above_twenty_per_minute() {
    let mut monitor = BlockingMonitor::started_at(t0());
    for _ in 0..101 {
        monitor.record(ok_at(t0()));
    }
    let report = monitor.detect_patterns_at(t0() + chrono::Duration::minutes(1));
    assert!(report.has(AlertKind::HighRequestRate));
    assert!(!report.has(AlertKind::HighFailureRate));
}

#[test]
fn recommendations_are_deduplicated() {
    let alerts = vec![
        Alert {
            kind: AlertKind::HighRequestRate,
            severity: Severity::Medium,
            message: String::new(),
        },
        Alert {
            kind: AlertKind::HighRequestRate,
            severity: Severity::Medium,
            message: String::new(),
        },
    ];
    let recs = recommendations_for(&alerts);
    assert_eq!(recs.len(), 3);
    assert!(recs.contains(&"Reduce concurrency".to_string()));
}

// ---------------------------------------------------------------------------
// Summary and sink
// ---------------------------------------------------------------------------

#[test]
fn summary_breaks_down_by_vendor_and_category() {
    let mut monitor = BlockingMonitor::started_at(t0());
    monitor.record(ok_at(t0()));
    monitor.record(failed_at(t0(), Some(403), "access denied"));
    let mut gpu = ok_at(t0());
    gpu.vendor = "Ryans".to_string();
    gpu.category = Category::Gpu;
    monitor.record(gpu);

    let summary = monitor.summary_at(t0() + chrono::Duration::minutes(2));
    assert_eq!(summary.total_requests, 3);
    assert!((summary.requests_per_minute - 1.5).abs() < 1e-9);
    assert!((summary.block_rate - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(summary.vendors["StarTech"].total_requests, 2);
    assert!((summary.vendors["StarTech"].success_rate - 0.5).abs() < 1e-9);
    assert!((summary.categories[&Category::Gpu].success_rate - 1.0).abs() < 1e-9);
}

#[test]
fn sink_appends_one_json_line_per_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");
    let mut monitor = BlockingMonitor::with_sink(&path).unwrap();
    monitor.record(ok_at(t0()));
    monitor.record(failed_at(t0(), Some(429), "too many requests"));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["metrics"]["status_code"], 429);
    assert_eq!(second["metrics"]["category"], "cpu");
    assert!(second["logged_at"].is_string());
}

#[test]
fn sink_open_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("metrics.jsonl");
    let err = BlockingMonitor::with_sink(&path).unwrap_err();
    assert!(matches!(err, ScraperError::MonitorSink { .. }));
}
