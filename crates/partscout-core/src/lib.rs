pub mod app_config;
pub mod config;
pub mod crawl_settings;
pub mod products;
pub mod vendors;

pub use app_config::{AppConfig, CrawlMode};
pub use config::{load_app_config, load_app_config_from_env};
pub use crawl_settings::{CrawlSettings, DelayRange};
pub use products::{CatalogCandidate, Category, ScrapedProduct};
pub use vendors::{load_vendors, parse_vendors, SelectorConfig, VendorConfig, VendorsFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read vendors file {path}: {source}")]
    VendorsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse vendors file: {0}")]
    VendorsFileParse(#[from] serde_yaml::Error),

    #[error("invalid vendors configuration: {0}")]
    Validation(String),
}
