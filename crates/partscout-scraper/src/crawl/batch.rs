use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use partscout_core::ScrapedProduct;
use tokio::sync::Semaphore;

use super::{CategoryCrawl, CrawlOrchestrator};
use crate::extract::Extractor;
use crate::session::FetchContext;

enum TaskResult {
    Parsed(String, ScrapedProduct),
    Unparsed(String),
    FetchFailed(String),
}

/// Fraction of a batch that did not yield a product.
#[allow(clippy::cast_precision_loss)]
pub(super) fn batch_error_rate(batch_len: usize, successes: usize) -> f64 {
    if batch_len == 0 {
        return 0.0;
    }
    batch_len.saturating_sub(successes) as f64 / batch_len as f64
}

impl CrawlOrchestrator {
    /// Fetches and parses `urls` in fixed-size batches, fanning out within a
    /// batch up to the mode's concurrency. Returns `true` if cancelled.
    pub(super) async fn process_batches(
        &self,
        extractor: &dyn Extractor,
        ctx: FetchContext<'_>,
        urls: Vec<String>,
        crawl: &mut CategoryCrawl,
    ) -> bool {
        let batch_size = self.settings.batch_size.max(1);
        let semaphore = Semaphore::new(self.settings.max_concurrent_requests.max(1));
        let total_batches = urls.len().div_ceil(batch_size);
        let mut buffer: Vec<TaskResult> = Vec::with_capacity(batch_size);

        for (index, batch) in urls.chunks(batch_size).enumerate() {
            if self.is_cancelled() {
                tracing::info!(
                    vendor = ctx.vendor,
                    category = %ctx.category,
                    completed = index,
                    total_batches,
                    "cancel requested, stopping before next batch"
                );
                return true;
            }

            let successes = AtomicUsize::new(0);
            let tasks = batch.iter().map(|url| {
                let semaphore = &semaphore;
                let successes = &successes;
                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return TaskResult::FetchFailed(url.clone());
                    };
                    let Some(html) = self
                        .pool
                        .fetch(url, self.settings.max_retries, ctx)
                        .await
                    else {
                        return TaskResult::FetchFailed(url.clone());
                    };
                    match extractor.parse_product(&html, url) {
                        Some(product) if product.is_matchable() => {
                            successes.fetch_add(1, Ordering::Relaxed);
                            TaskResult::Parsed(url.clone(), product)
                        }
                        _ => {
                            tracing::warn!(
                                vendor = ctx.vendor,
                                category = %ctx.category,
                                url = %url,
                                "could not parse product page"
                            );
                            TaskResult::Unparsed(url.clone())
                        }
                    }
                }
            });
            buffer.extend(join_all(tasks).await);

            for result in buffer.drain(..) {
                match result {
                    TaskResult::Parsed(url, product) => {
                        crawl.fetched += 1;
                        crawl.parsed += 1;
                        crawl.products.push((url, product));
                    }
                    TaskResult::Unparsed(_) => {
                        crawl.fetched += 1;
                        crawl.failed += 1;
                    }
                    TaskResult::FetchFailed(_) => crawl.failed += 1,
                }
            }

            let completed = index + 1;
            let successes = successes.into_inner();
            let error_rate = batch_error_rate(batch.len(), successes);
            tracing::info!(
                vendor = ctx.vendor,
                category = %ctx.category,
                batch = completed,
                total_batches,
                successes,
                size = batch.len(),
                error_rate,
                "batch complete"
            );

            if self.settings.gc_frequency > 0 && completed % self.settings.gc_frequency == 0 {
                buffer.shrink_to_fit();
                crawl.products.shrink_to_fit();
            }

            if completed < total_batches {
                self.apply_monitor_feedback();
                let cooldown = if error_rate > self.settings.error_threshold {
                    self.settings.high_error_delay
                } else {
                    self.settings.batch_delay
                };
                if !cooldown.is_zero() {
                    let pause = cooldown.sample();
                    tracing::debug!(
                        vendor = ctx.vendor,
                        category = %ctx.category,
                        pause_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
                        "cooling down between batches"
                    );
                    tokio::time::sleep(pause).await;
                }
            }
        }

        false
    }
}
