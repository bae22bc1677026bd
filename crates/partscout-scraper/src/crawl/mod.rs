//! Category crawl orchestration.
//!
//! One category crawl walks `Seeded → Paging → CollectingUrls →
//! BatchProcessing → Done`. A failed first listing page ends it as
//! `Aborted`; a raised cancel flag ends it as `Cancelled` once the batch in
//! flight has drained. Nothing here returns an error: every failure is
//! counted and logged, and the caller gets whatever was collected.

mod batch;
mod listing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use partscout_core::{Category, CrawlSettings, ScrapedProduct};
use serde::Serialize;

use crate::extract::Extractor;
use crate::monitor::BlockingReport;
use crate::session::{FetchContext, SessionPool};

pub use listing::{collect_urls, dedupe_urls};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlPhase {
    Seeded,
    Paging,
    CollectingUrls,
    BatchProcessing,
    Done,
    Aborted,
    Cancelled,
}

impl CrawlPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlPhase::Seeded => "seeded",
            CrawlPhase::Paging => "paging",
            CrawlPhase::CollectingUrls => "collecting_urls",
            CrawlPhase::BatchProcessing => "batch_processing",
            CrawlPhase::Done => "done",
            CrawlPhase::Aborted => "aborted",
            CrawlPhase::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CrawlPhase::Done | CrawlPhase::Aborted | CrawlPhase::Cancelled
        )
    }
}

impl std::fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of crawling one vendor category.
#[derive(Debug, Clone)]
pub struct CategoryCrawl {
    pub vendor: String,
    pub category: Category,
    pub status: CrawlPhase,
    /// `(product url, parsed record)` in processing order.
    pub products: Vec<(String, ScrapedProduct)>,
    pub pages: usize,
    /// Unique product URLs found on listing pages.
    pub discovered: usize,
    pub fetched: usize,
    pub parsed: usize,
    pub failed: usize,
}

impl CategoryCrawl {
    fn new(vendor: &str, category: Category) -> Self {
        Self {
            vendor: vendor.to_owned(),
            category,
            status: CrawlPhase::Seeded,
            products: Vec::new(),
            pages: 0,
            discovered: 0,
            fetched: 0,
            parsed: 0,
            failed: 0,
        }
    }

    fn enter(&mut self, phase: CrawlPhase) {
        tracing::debug!(
            vendor = %self.vendor,
            category = %self.category,
            from = %self.status,
            to = %phase,
            "crawl phase"
        );
        self.status = phase;
    }
}

pub struct CrawlOrchestrator {
    pool: Arc<SessionPool>,
    settings: CrawlSettings,
    cancel: Arc<AtomicBool>,
}

impl CrawlOrchestrator {
    #[must_use]
    pub fn new(pool: Arc<SessionPool>, settings: CrawlSettings) -> Self {
        Self {
            pool,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares an externally owned cancel flag, e.g. one set on Ctrl-C.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Runs the monitor's pattern check and hands the resulting pressure to
    /// the rate limiter.
    pub fn apply_monitor_feedback(&self) -> BlockingReport {
        let report = self
            .pool
            .monitor()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detect_patterns();

        let pressure = report.suggested_pressure();
        self.pool.limiter().set_pressure(pressure);

        for alert in &report.alerts {
            tracing::warn!(
                kind = %alert.kind,
                severity = ?alert.severity,
                pressure,
                "{}",
                alert.message
            );
        }
        report
    }

    /// Crawls one category from its seed listing URL.
    pub async fn crawl_category(
        &self,
        extractor: &dyn Extractor,
        category: Category,
        seed_url: &str,
    ) -> CategoryCrawl {
        let vendor = extractor.vendor();
        let ctx = FetchContext { vendor, category };
        let mut crawl = CategoryCrawl::new(vendor, category);

        tracing::info!(vendor, category = %category, seed_url, "crawling category");

        crawl.enter(CrawlPhase::Paging);
        let walk = self.walk_listing(extractor, ctx, seed_url).await;
        crawl.pages = walk.pages;

        if walk.first_page_failed {
            crawl.enter(CrawlPhase::Aborted);
            tracing::error!(
                vendor,
                category = %category,
                seed_url,
                "first listing page failed, aborting category"
            );
            return crawl;
        }

        crawl.enter(CrawlPhase::CollectingUrls);
        let urls = collect_urls(walk.urls, self.settings.randomize_order);
        crawl.discovered = urls.len();
        tracing::info!(
            vendor,
            category = %category,
            pages = crawl.pages,
            discovered = crawl.discovered,
            "collected product urls"
        );

        if walk.cancelled || self.is_cancelled() {
            crawl.enter(CrawlPhase::Cancelled);
            return crawl;
        }

        crawl.enter(CrawlPhase::BatchProcessing);
        let cancelled = self.process_batches(extractor, ctx, urls, &mut crawl).await;

        crawl.enter(if cancelled {
            CrawlPhase::Cancelled
        } else {
            CrawlPhase::Done
        });
        tracing::info!(
            vendor,
            category = %category,
            status = %crawl.status,
            fetched = crawl.fetched,
            parsed = crawl.parsed,
            failed = crawl.failed,
            "category crawl finished"
        );
        crawl
    }
}
