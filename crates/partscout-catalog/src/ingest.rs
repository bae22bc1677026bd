//! Writing a category's scraped products into the catalog.
//!
//! Products are matched and written in batches. Each batch is one
//! [`CatalogStore::apply_batch`] call, so a store failure loses that batch
//! only; the products in it are counted as failed and the next batch runs.

use partscout_core::{Category, ScrapedProduct};
use serde::Serialize;

use crate::matcher::{log_decision, NormalizationEngine};
use crate::similarity::tokenize;
use crate::store::{CatalogStore, CatalogWrite, NewCatalogEntry, PriceQuote};

pub const DEFAULT_INGEST_BATCH_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Products whose price was written against an existing entry.
    pub matched: usize,
    /// New entries created for a trusted vendor's unmatched products.
    pub created: usize,
    /// Products left unmatched (below threshold, vetoed, or no candidates).
    pub unmatched: usize,
    /// Products skipped because no price could be read.
    pub unpriced: usize,
    /// Products lost to a store failure or an invalid record.
    pub failed: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.matched += other.matched;
        self.created += other.created;
        self.unmatched += other.unmatched;
        self.unpriced += other.unpriced;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogIngestor {
    engine: NormalizationEngine,
    batch_size: usize,
}

impl Default for CatalogIngestor {
    fn default() -> Self {
        Self {
            engine: NormalizationEngine::default(),
            batch_size: DEFAULT_INGEST_BATCH_SIZE,
        }
    }
}

impl CatalogIngestor {
    #[must_use]
    pub fn new(engine: NormalizationEngine, batch_size: usize) -> Self {
        Self {
            engine,
            batch_size: batch_size.max(1),
        }
    }

    /// Matches and stores `products` for one vendor and category.
    ///
    /// When `trusted` is set, unmatched products (including vetoed ones)
    /// become new catalog entries carrying their first price. Candidates are
    /// re-read before every batch so entries created by one batch are
    /// matchable in the next.
    pub async fn ingest<'p, I>(
        &self,
        store: &dyn CatalogStore,
        category: Category,
        trusted: bool,
        products: I,
    ) -> IngestReport
    where
        I: IntoIterator<Item = &'p ScrapedProduct>,
    {
        let products: Vec<&ScrapedProduct> = products.into_iter().collect();
        let mut report = IngestReport::default();

        for (index, batch) in products.chunks(self.batch_size).enumerate() {
            let candidates = match store.candidates_for(category).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(
                        category = %category,
                        batch = index,
                        error = %e,
                        "candidate lookup failed, skipping batch"
                    );
                    report.failed += batch.len();
                    continue;
                }
            };

            let mut batch_report = IngestReport::default();
            let mut writes = Vec::new();
            // Normalized names created so far in this batch; a repeat listing
            // of the same product must not create a second entry.
            let mut pending_names: Vec<Vec<String>> = Vec::new();

            for product in batch {
                if !product.is_matchable() {
                    batch_report.failed += 1;
                    continue;
                }
                if product.has_unparsed_price() {
                    tracing::debug!(url = %product.url, "skipping product without price");
                    batch_report.unpriced += 1;
                    continue;
                }

                let decision = self.engine.match_product(product, category, &candidates);
                log_decision(product, category, &decision);

                if let Some(id) = decision.catalog_id {
                    writes.push(CatalogWrite::Price(PriceQuote::from_product(id, product)));
                    batch_report.matched += 1;
                    continue;
                }

                let mut tokens = tokenize(&product.name);
                tokens.sort();
                if trusted && !pending_names.contains(&tokens) {
                    pending_names.push(tokens);
                    writes.push(CatalogWrite::CreateWithPrice {
                        entry: NewCatalogEntry::from_product(product, category),
                        quote: Some(PriceQuote::from_product(0, product)),
                    });
                    batch_report.created += 1;
                } else {
                    batch_report.unmatched += 1;
                }
            }

            if writes.is_empty() {
                report.merge(batch_report);
                continue;
            }

            match store.apply_batch(writes).await {
                Ok(created) => {
                    tracing::debug!(
                        category = %category,
                        batch = index,
                        matched = batch_report.matched,
                        created = created.len(),
                        "catalog batch written"
                    );
                    report.merge(batch_report);
                }
                Err(e) => {
                    let lost = batch_report.matched + batch_report.created;
                    tracing::error!(
                        category = %category,
                        batch = index,
                        lost,
                        error = %e,
                        "catalog batch rolled back"
                    );
                    report.merge(IngestReport {
                        matched: 0,
                        created: 0,
                        failed: batch_report.failed + lost,
                        ..batch_report
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
