//! End-of-run report: per-category counts plus the monitor's view of the run.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use partscout_catalog::IngestReport;
use partscout_core::{Category, CrawlMode};
use partscout_scraper::monitor::Alert;
use partscout_scraper::{BlockingReport, CategoryCrawl, CrawlPhase, MonitorSummary};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CategoryReport {
    pub vendor: String,
    pub category: Category,
    pub status: CrawlPhase,
    pub pages: usize,
    pub discovered: usize,
    pub fetched: usize,
    pub parsed: usize,
    pub matched: usize,
    pub created: usize,
    pub unmatched: usize,
    pub unpriced: usize,
    /// Product fetch/parse failures plus products lost to catalog write errors.
    pub failed: usize,
}

impl CategoryReport {
    pub(crate) fn new(crawl: &CategoryCrawl, ingest: IngestReport) -> Self {
        Self {
            vendor: crawl.vendor.clone(),
            category: crawl.category,
            status: crawl.status,
            pages: crawl.pages,
            discovered: crawl.discovered,
            fetched: crawl.fetched,
            parsed: crawl.parsed,
            matched: ingest.matched,
            created: ingest.created,
            unmatched: ingest.unmatched,
            unpriced: ingest.unpriced,
            failed: crawl.failed + ingest.failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunReport {
    pub mode: CrawlMode,
    pub dry_run: bool,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Parsed products per minute of wall time.
    pub items_per_minute: f64,
    pub categories: Vec<CategoryReport>,
    pub monitor: MonitorSummary,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
}

impl RunReport {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn finish(
        mode: CrawlMode,
        dry_run: bool,
        cancelled: bool,
        started_at: DateTime<Utc>,
        categories: Vec<CategoryReport>,
        monitor: MonitorSummary,
        blocking: BlockingReport,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_secs = (finished_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let parsed: usize = categories.iter().map(|c| c.parsed).sum();
        let items_per_minute = if duration_secs > 0.0 {
            parsed as f64 / (duration_secs / 60.0)
        } else {
            0.0
        };
        Self {
            mode,
            dry_run,
            cancelled,
            started_at,
            finished_at,
            duration_secs,
            items_per_minute,
            categories,
            monitor,
            alerts: blocking.alerts,
            recommendations: blocking.recommendations,
        }
    }

    pub(crate) fn totals(&self) -> CategoryTotals {
        self.categories
            .iter()
            .fold(CategoryTotals::default(), |mut t, c| {
                t.parsed += c.parsed;
                t.matched += c.matched;
                t.created += c.created;
                t.failed += c.failed;
                t.aborted += usize::from(c.status == CrawlPhase::Aborted);
                t
            })
    }

    pub(crate) fn print_summary(&self) {
        println!(
            "crawl {} ({}{}) in {:.0}s",
            if self.cancelled { "cancelled" } else { "finished" },
            self.mode,
            if self.dry_run { ", dry-run" } else { "" },
            self.duration_secs
        );
        for c in &self.categories {
            println!(
                "  {:<16} {:<12} {:<10} discovered={} parsed={} matched={} created={} failed={}",
                c.vendor,
                c.category.as_str(),
                c.status.as_str(),
                c.discovered,
                c.parsed,
                c.matched,
                c.created,
                c.failed
            );
        }
        let totals = self.totals();
        println!(
            "totals: parsed={} matched={} created={} failed={} aborted_categories={} ({:.1} items/min)",
            totals.parsed,
            totals.matched,
            totals.created,
            totals.failed,
            totals.aborted,
            self.items_per_minute
        );
        println!(
            "requests: {} total, {:.1}% success, {:.1}% blocked",
            self.monitor.total_requests,
            self.monitor.success_rate * 100.0,
            self.monitor.block_rate * 100.0
        );
        for alert in &self.alerts {
            println!("alert [{:?}] {}", alert.severity, alert.message);
        }
        for rec in &self.recommendations {
            println!("  - {rec}");
        }
    }

    /// Writes the report as pretty JSON, creating parent directories.
    pub(crate) fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing run report to {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CategoryTotals {
    pub parsed: usize,
    pub matched: usize,
    pub created: usize,
    pub failed: usize,
    pub aborted: usize,
}
