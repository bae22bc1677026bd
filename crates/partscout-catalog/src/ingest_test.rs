use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use partscout_core::CatalogCandidate;

use super::*;
use crate::store::{MemoryCatalogStore, StoreError};

fn product(name: &str, price: i64) -> ScrapedProduct {
    ScrapedProduct::new(name, "StarTech", price, format!("https://s/{}", name.len()))
        .with_status("In Stock")
}

async fn seeded(names: &[&str], category: Category) -> MemoryCatalogStore {
    let store = MemoryCatalogStore::new();
    for name in names {
        store
            .create_entry(NewCatalogEntry {
                canonical_name: (*name).to_string(),
                category,
                image_url: None,
                specs: BTreeMap::new(),
            })
            .await
            .unwrap();
    }
    store
}

/// Delegates to a memory store but fails `apply_batch` on chosen calls.
struct FlakyStore {
    inner: MemoryCatalogStore,
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl CatalogStore for FlakyStore {
    async fn candidates_for(
        &self,
        category: Category,
    ) -> Result<Vec<CatalogCandidate>, StoreError> {
        self.inner.candidates_for(category).await
    }

    async fn upsert_price(&self, quote: PriceQuote) -> Result<(), StoreError> {
        self.inner.upsert_price(quote).await
    }

    async fn create_entry(&self, entry: NewCatalogEntry) -> Result<i64, StoreError> {
        self.inner.create_entry(entry).await
    }

    async fn apply_batch(&self, writes: Vec<CatalogWrite>) -> Result<Vec<i64>, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on {
            return Err(StoreError::UnknownEntry(-1));
        }
        self.inner.apply_batch(writes).await
    }
}

#[tokio::test]
async fn matched_products_get_prices() {
    let store = seeded(&["AMD Ryzen 5 5600X", "Intel Core i5 12400F"], Category::Cpu).await;
    let products = [
        product("AMD Ryzen 5 5600X Processor", 18_500),
        product("Intel Core i5-12400F", 16_000),
    ];

    let report = CatalogIngestor::default()
        .ingest(&store, Category::Cpu, false, &products)
        .await;

    assert_eq!(report.matched, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(store.prices_for(1)[0].price, 18_500);
    assert_eq!(store.prices_for(2)[0].price, 16_000);
}

#[tokio::test]
async fn untrusted_vendor_never_creates_entries() {
    let store = seeded(&["AMD Ryzen 5 5600G"], Category::Cpu).await;
    let products = [product("AMD Ryzen 5 5600X", 18_500)];

    let report = CatalogIngestor::default()
        .ingest(&store, Category::Cpu, false, &products)
        .await;

    assert_eq!(report.unmatched, 1);
    assert_eq!(report.created, 0);
    assert_eq!(store.snapshot().entries.len(), 1);
    assert!(store.snapshot().prices.is_empty());
}

#[tokio::test]
async fn trusted_vendor_creates_entry_with_price() {
    let store = seeded(&["AMD Ryzen 5 5600G"], Category::Cpu).await;
    let products = [product("AMD Ryzen 5 5600X", 18_500)];

    let report = CatalogIngestor::default()
        .ingest(&store, Category::Cpu, true, &products)
        .await;

    assert_eq!(report.created, 1);
    let data = store.snapshot();
    assert_eq!(data.entries.len(), 2);
    assert_eq!(data.entries[1].canonical_name, "AMD Ryzen 5 5600X");
    assert_eq!(store.prices_for(2)[0].vendor, "StarTech");
}

#[tokio::test]
async fn duplicate_listing_in_batch_creates_once() {
    let store = MemoryCatalogStore::new();
    let products = [
        product("RTX 4060 Ventus", 36_000),
        product("ventus rtx 4060", 36_500),
    ];

    let report = CatalogIngestor::default()
        .ingest(&store, Category::Gpu, true, &products)
        .await;

    assert_eq!(report.created, 1);
    assert_eq!(report.unmatched, 1);
    assert_eq!(store.snapshot().entries.len(), 1);
}

#[tokio::test]
async fn entries_created_in_one_batch_match_in_the_next() {
    let store = MemoryCatalogStore::new();
    let products = [
        product("RTX 4060 Ventus", 36_000),
        product("MSI RTX 4060 Ventus 2X", 36_500),
    ];

    let report = CatalogIngestor::new(NormalizationEngine::default(), 1)
        .ingest(&store, Category::Gpu, true, &products)
        .await;

    assert_eq!(report.created, 1);
    assert_eq!(report.matched, 1);
}

#[tokio::test]
async fn unpriced_products_are_not_written() {
    let store = seeded(&["RTX 3060"], Category::Gpu).await;
    let products = [product("RTX 3060", 0)];

    let report = CatalogIngestor::default()
        .ingest(&store, Category::Gpu, true, &products)
        .await;

    assert_eq!(report.unpriced, 1);
    assert_eq!(report.matched, 0);
    assert!(store.snapshot().prices.is_empty());
}

#[tokio::test]
async fn failed_batch_is_counted_and_next_batch_proceeds() {
    let store = FlakyStore {
        inner: seeded(&["RTX 3060", "RTX 4060"], Category::Gpu).await,
        calls: AtomicUsize::new(0),
        fail_on: 0,
    };
    let products = [product("RTX 3060", 30_000), product("RTX 4060", 36_000)];

    let report = CatalogIngestor::new(NormalizationEngine::default(), 1)
        .ingest(&store, Category::Gpu, false, &products)
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.matched, 1);
    assert!(store.inner.prices_for(1).is_empty());
    assert_eq!(store.inner.prices_for(2).len(), 1);
}

#[test]
fn reports_merge_field_by_field() {
    let mut a = IngestReport {
        matched: 1,
        created: 2,
        unmatched: 3,
        unpriced: 4,
        failed: 5,
    };
    a.merge(a);
    assert_eq!(a.matched, 2);
    assert_eq!(a.failed, 10);
}
