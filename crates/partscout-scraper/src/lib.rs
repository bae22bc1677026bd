pub mod behavior;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod monitor;
pub mod rate_limit;
pub mod session;

pub use behavior::BehaviorConfig;
pub use crawl::{CategoryCrawl, CrawlOrchestrator, CrawlPhase};
pub use error::{FetchError, ScraperError};
pub use extract::{clean_price, Extractor, SelectorExtractor};
pub use fingerprint::{Fingerprint, FINGERPRINTS};
pub use monitor::{
    AlertKind, BlockingMonitor, BlockingReport, MonitorSummary, RequestOutcome, SharedMonitor,
    WindowStats,
};
pub use rate_limit::{retry_backoff, AdaptiveRateLimiter};
pub use session::{FetchContext, PoolConfig, SessionPool, StealthSession};
