use std::collections::BTreeMap;
use std::time::Duration;

use partscout_catalog::NewCatalogEntry;
use partscout_core::{parse_vendors, CrawlMode};
use partscout_scraper::{BehaviorConfig, CrawlPhase};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn vendors(base: &str, trusted: bool) -> VendorsFile {
    let yaml = format!(
        r#"
vendors:
  - name: Test Shop
    trusted: {trusted}
    selectors:
      listing_link: [".p-item a"]
      name: ["h1"]
      price: [".price"]
      status: [".status"]
    categories:
      cpu: {base}/cpu
      gpu: {base}/gpu
  - name: Other Shop
    selectors:
      listing_link: ["a.product"]
      name: ["h1"]
    categories:
      ram: {base}/other/ram
"#
    );
    parse_vendors(&yaml).expect("valid test vendors")
}

fn orchestrator() -> CrawlOrchestrator {
    let mut settings = CrawlSettings::for_mode(CrawlMode::Balanced).without_delays();
    settings.randomize_order = false;
    settings.max_retries = 0;
    let config = PoolConfig {
        size: 2,
        max_requests_per_session: 15,
        request_timeout: Duration::from_secs(5),
        retry_backoff_base: Duration::ZERO,
        behavior: BehaviorConfig::disabled(),
    };
    let pool = SessionPool::new(
        config,
        BlockingMonitor::new().shared(),
        Arc::new(AdaptiveRateLimiter::from_millis(0)),
    )
    .expect("failed to build test pool");
    CrawlOrchestrator::new(Arc::new(pool), settings)
}

async fn seeded_store() -> MemoryCatalogStore {
    let store = MemoryCatalogStore::new();
    store
        .create_entry(NewCatalogEntry {
            canonical_name: "RTX 3060 Ventus 2X".to_string(),
            category: Category::Gpu,
            image_url: None,
            specs: BTreeMap::new(),
        })
        .await
        .unwrap();
    store
}

async fn mount(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

async fn mount_gpu_shop(server: &MockServer) {
    mount(server, "/cpu", 500, "internal error").await;
    mount(
        server,
        "/gpu",
        200,
        r#"<html><body>
            <div class="p-item"><a href="/p/rtx3060">a</a></div>
            <div class="p-item"><a href="/p/rx7600">b</a></div>
        </body></html>"#,
    )
    .await;
    mount(
        server,
        "/p/rtx3060",
        200,
        r#"<h1>MSI GeForce RTX 3060 Ventus 2X 12G</h1><span class="price">৳ 42,000</span><span class="status">In Stock</span>"#,
    )
    .await;
    mount(
        server,
        "/p/rx7600",
        200,
        r#"<h1>AMD Radeon RX 7600</h1><span class="price">৳ 35,500</span><span class="status">In Stock</span>"#,
    )
    .await;
}

// ---------------------------------------------------------------------------
// CrawlFilter
// ---------------------------------------------------------------------------

#[test]
fn empty_filter_selects_every_vendor_and_category() {
    let file = vendors("https://shop.test", false);
    let filter = CrawlFilter::default();
    assert_eq!(filter.select_vendors(&file).unwrap().len(), 2);
    assert!(filter.wants(Category::Case));
}

#[test]
fn filter_selects_by_slug_without_duplicates() {
    let file = vendors("https://shop.test", false);
    let filter = CrawlFilter {
        vendors: vec!["other-shop".into(), "Other Shop".into()],
        categories: vec![Category::Ram],
    };
    let selected = filter.select_vendors(&file).unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].name, "Other Shop");
    assert!(filter.wants(Category::Ram));
    assert!(!filter.wants(Category::Gpu));
}

#[test]
fn unknown_vendor_is_an_error() {
    let file = vendors("https://shop.test", false);
    let filter = CrawlFilter {
        vendors: vec!["nowhere".into()],
        categories: Vec::new(),
    };
    let err = filter.select_vendors(&file).unwrap_err();
    assert!(err.to_string().contains("nowhere"));
}

// ---------------------------------------------------------------------------
// crawl_vendors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn aborted_category_does_not_stop_the_next_one() {
    let server = MockServer::start().await;
    mount_gpu_shop(&server).await;
    let file = vendors(&server.uri(), false);
    let filter = CrawlFilter {
        vendors: vec!["test-shop".into()],
        categories: Vec::new(),
    };
    let selected = filter.select_vendors(&file).unwrap();
    let store = seeded_store().await;

    let report = crawl_vendors(
        &orchestrator(),
        &selected,
        &filter,
        &store,
        &CatalogIngestor::default(),
        false,
    )
    .await;

    assert_eq!(report.categories.len(), 2);
    let cpu = &report.categories[0];
    assert_eq!(cpu.category, Category::Cpu);
    assert_eq!(cpu.status, CrawlPhase::Aborted);
    assert_eq!(cpu.matched, 0);
    assert_eq!(cpu.discovered, 0);

    let gpu = &report.categories[1];
    assert_eq!(gpu.status, CrawlPhase::Done);
    assert_eq!(gpu.parsed, 2);
    assert_eq!(gpu.matched, 1);
    assert_eq!(gpu.unmatched, 1);
    assert_eq!(gpu.created, 0);

    let prices = store.prices_for(1);
    assert_eq!(prices.len(), 1);
    assert_eq!(prices[0].price, 42_000);
    assert!(prices[0].url.ends_with("/p/rtx3060"));
    assert!(!report.cancelled);
    assert_eq!(report.totals().aborted, 1);
    assert_eq!(report.monitor.total_requests, 4);
}

#[tokio::test]
async fn trusted_vendor_grows_the_catalog() {
    let server = MockServer::start().await;
    mount_gpu_shop(&server).await;
    let file = vendors(&server.uri(), true);
    let filter = CrawlFilter {
        vendors: vec!["test-shop".into()],
        categories: vec![Category::Gpu],
    };
    let selected = filter.select_vendors(&file).unwrap();
    let store = seeded_store().await;

    let report = crawl_vendors(
        &orchestrator(),
        &selected,
        &filter,
        &store,
        &CatalogIngestor::default(),
        false,
    )
    .await;

    assert_eq!(report.categories.len(), 1);
    assert_eq!(report.categories[0].created, 1);
    let names: Vec<String> = store
        .snapshot()
        .entries
        .into_iter()
        .map(|e| e.canonical_name)
        .collect();
    assert_eq!(names, vec!["RTX 3060 Ventus 2X", "AMD Radeon RX 7600"]);
}

#[tokio::test]
async fn cancelled_run_crawls_nothing() {
    let server = MockServer::start().await;
    mount_gpu_shop(&server).await;
    let file = vendors(&server.uri(), false);
    let filter = CrawlFilter::default();
    let selected = filter.select_vendors(&file).unwrap();
    let store = MemoryCatalogStore::new();

    let orchestrator = orchestrator();
    orchestrator.cancel_flag().store(true, Ordering::Relaxed);
    let report = crawl_vendors(
        &orchestrator,
        &selected,
        &filter,
        &store,
        &CatalogIngestor::default(),
        true,
    )
    .await;

    assert!(report.cancelled);
    assert!(report.dry_run);
    assert!(report.categories.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn report_is_written_as_json() {
    let server = MockServer::start().await;
    mount_gpu_shop(&server).await;
    let file = vendors(&server.uri(), false);
    let filter = CrawlFilter {
        vendors: vec!["test-shop".into()],
        categories: vec![Category::Cpu],
    };
    let selected = filter.select_vendors(&file).unwrap();
    let store = MemoryCatalogStore::new();

    let report = crawl_vendors(
        &orchestrator(),
        &selected,
        &filter,
        &store,
        &CatalogIngestor::default(),
        false,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("run.json");
    report.write_json(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["mode"], "balanced");
    assert_eq!(json["categories"][0]["status"], "aborted");
    assert_eq!(json["categories"][0]["category"], "cpu");
    assert!(json["monitor"]["total_requests"].as_u64().unwrap() >= 1);
}
