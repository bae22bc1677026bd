//! The `crawl` command: walk every selected vendor and category, ingest the
//! results, and report.
//!
//! Category-level problems never stop the run. A vendor whose selectors do
//! not compile is skipped, an aborted category is reported as such, and the
//! next category starts after the usual pause.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use anyhow::Context;
use chrono::Utc;
use partscout_catalog::{CatalogIngestor, CatalogStore, MemoryCatalogStore, NormalizationEngine};
use partscout_core::{AppConfig, Category, CrawlSettings, DelayRange, VendorConfig, VendorsFile};
use partscout_scraper::{
    AdaptiveRateLimiter, BlockingMonitor, CrawlOrchestrator, PoolConfig, SelectorExtractor,
    SessionPool,
};

use crate::report::{CategoryReport, RunReport};

#[derive(Debug, Clone, Default)]
pub(crate) struct CrawlFilter {
    pub vendors: Vec<String>,
    pub categories: Vec<Category>,
}

impl CrawlFilter {
    /// Vendors named by the filter, in filter order, or every vendor when the
    /// filter names none.
    pub(crate) fn select_vendors<'a>(
        &self,
        file: &'a VendorsFile,
    ) -> anyhow::Result<Vec<&'a VendorConfig>> {
        if self.vendors.is_empty() {
            return Ok(file.vendors.iter().collect());
        }
        let mut selected: Vec<&VendorConfig> = Vec::with_capacity(self.vendors.len());
        for name in &self.vendors {
            let vendor = file
                .find(name)
                .ok_or_else(|| anyhow::anyhow!("vendor '{name}' not found in vendors file"))?;
            if !selected.iter().any(|v| v.name == vendor.name) {
                selected.push(vendor);
            }
        }
        Ok(selected)
    }

    pub(crate) fn wants(&self, category: Category) -> bool {
        self.categories.is_empty() || self.categories.contains(&category)
    }
}

async fn pause(range: DelayRange, between: &'static str) {
    if range.is_zero() {
        return;
    }
    let delay = range.sample();
    tracing::debug!(
        between,
        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        "pausing"
    );
    tokio::time::sleep(delay).await;
}

/// Runs the `crawl` command end to end.
///
/// # Errors
///
/// Returns an error if the vendors file, catalog file or monitor sink
/// cannot be opened, the session pool cannot be built, or the catalog or
/// report cannot be written. Crawl failures are reported, not returned.
pub(crate) async fn run_crawl(
    config: &AppConfig,
    filter: &CrawlFilter,
    report_path: Option<&Path>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let vendors_file = partscout_core::load_vendors(&config.vendors_path)
        .with_context(|| format!("loading vendors from {}", config.vendors_path.display()))?;
    let vendors = filter.select_vendors(&vendors_file)?;
    let store = MemoryCatalogStore::load(&config.catalog_path)
        .with_context(|| format!("loading catalog from {}", config.catalog_path.display()))?;

    let settings = CrawlSettings::from_app_config(config);
    let monitor = match &config.monitor_log_path {
        Some(path) => BlockingMonitor::with_sink(path)?,
        None => BlockingMonitor::new(),
    };
    let limiter = Arc::new(AdaptiveRateLimiter::from_millis(settings.base_delay_ms));
    let pool = SessionPool::new(
        PoolConfig::from_settings(config, &settings),
        monitor.shared(),
        limiter,
    )
    .context("building session pool")?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the batch in flight");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let ingestor = CatalogIngestor::new(NormalizationEngine::default(), settings.batch_size);
    let orchestrator = CrawlOrchestrator::new(Arc::new(pool), settings).with_cancel_flag(cancel);

    tracing::info!(
        mode = %config.crawl_mode,
        vendors = vendors.len(),
        dry_run,
        "starting crawl"
    );
    let report = crawl_vendors(&orchestrator, &vendors, filter, &store, &ingestor, dry_run).await;
    orchestrator.pool().shutdown().await;

    if dry_run {
        tracing::info!(
            path = %config.catalog_path.display(),
            "dry-run: catalog file left untouched"
        );
    } else {
        store
            .save(&config.catalog_path)
            .with_context(|| format!("saving catalog to {}", config.catalog_path.display()))?;
    }

    report.print_summary();
    if let Some(path) = report_path {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "run report written");
    }
    Ok(())
}

/// Crawls and ingests every selected vendor category in order.
pub(crate) async fn crawl_vendors(
    orchestrator: &CrawlOrchestrator,
    vendors: &[&VendorConfig],
    filter: &CrawlFilter,
    store: &dyn CatalogStore,
    ingestor: &CatalogIngestor,
    dry_run: bool,
) -> RunReport {
    let started_at = Utc::now();
    let settings = orchestrator.settings().clone();
    let mut categories: Vec<CategoryReport> = Vec::new();

    for (index, vendor) in vendors.iter().enumerate() {
        if orchestrator.is_cancelled() {
            break;
        }
        if index > 0 {
            pause(settings.vendor_delay, "vendors").await;
        }

        let extractor = match SelectorExtractor::from_vendor(vendor) {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(vendor = %vendor.name, error = %e, "skipping vendor");
                continue;
            }
        };

        let mut first = true;
        for (&category, seed_url) in &vendor.categories {
            if !filter.wants(category) {
                continue;
            }
            if orchestrator.is_cancelled() {
                break;
            }
            if !first {
                pause(settings.category_delay, "categories").await;
            }
            first = false;

            let crawl = orchestrator
                .crawl_category(&extractor, category, seed_url)
                .await;
            let ingest = ingestor
                .ingest(
                    store,
                    category,
                    vendor.trusted,
                    crawl.products.iter().map(|(_, p)| p),
                )
                .await;
            tracing::info!(
                vendor = %vendor.name,
                category = %category,
                status = %crawl.status,
                matched = ingest.matched,
                created = ingest.created,
                unmatched = ingest.unmatched,
                "category ingested"
            );
            categories.push(CategoryReport::new(&crawl, ingest));

            orchestrator.apply_monitor_feedback();
        }
    }

    let (summary, blocking) = {
        let monitor = orchestrator
            .pool()
            .monitor()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        (monitor.summary(), monitor.detect_patterns())
    };

    RunReport::finish(
        settings.mode,
        dry_run,
        orchestrator.is_cancelled(),
        started_at,
        categories,
        summary,
        blocking,
    )
}

#[cfg(test)]
#[path = "crawl_test.rs"]
mod tests;
