use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How hard the crawler is allowed to push a vendor.
///
/// The mode selects concurrency, page cap and every delay range; see
/// [`crate::CrawlSettings::for_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl std::fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlMode::Conservative => write!(f, "conservative"),
            CrawlMode::Balanced => write!(f, "balanced"),
            CrawlMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for CrawlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(CrawlMode::Conservative),
            "balanced" => Ok(CrawlMode::Balanced),
            "aggressive" => Ok(CrawlMode::Aggressive),
            other => Err(format!(
                "unknown crawl mode '{other}'; expected conservative, balanced, or aggressive"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub crawl_mode: CrawlMode,
    pub log_level: String,
    pub vendors_path: PathBuf,
    pub catalog_path: PathBuf,
    /// JSONL sink for per-request monitor records. `None` disables the sink.
    pub monitor_log_path: Option<PathBuf>,
    /// Overrides the mode's page cap when set.
    pub max_pages_per_category: Option<usize>,
    pub max_requests_per_session: u32,
    pub session_pool_size: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}
