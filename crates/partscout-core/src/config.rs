use crate::app_config::{AppConfig, CrawlMode};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let crawl_mode = or_default("PARTSCOUT_CRAWL_MODE", "balanced")
        .parse::<CrawlMode>()
        .map_err(|reason| invalid("PARTSCOUT_CRAWL_MODE", reason))?;

    let log_level = or_default("PARTSCOUT_LOG_LEVEL", "info");
    let vendors_path = PathBuf::from(or_default("PARTSCOUT_VENDORS_PATH", "./config/vendors.yaml"));
    let catalog_path = PathBuf::from(or_default("PARTSCOUT_CATALOG_PATH", "./data/catalog.json"));

    // An explicitly empty value turns the JSONL sink off.
    let monitor_log_path = match lookup("PARTSCOUT_MONITOR_LOG_PATH") {
        Ok(raw) if raw.trim().is_empty() => None,
        Ok(raw) => Some(PathBuf::from(raw)),
        Err(_) => Some(PathBuf::from("scraper_metrics.jsonl")),
    };

    let max_pages_per_category = match lookup("PARTSCOUT_MAX_PAGES_PER_CATEGORY") {
        Ok(raw) => {
            let pages = raw
                .parse::<usize>()
                .map_err(|e| invalid("PARTSCOUT_MAX_PAGES_PER_CATEGORY", e.to_string()))?;
            if pages == 0 {
                return Err(invalid(
                    "PARTSCOUT_MAX_PAGES_PER_CATEGORY",
                    "must be at least 1".to_string(),
                ));
            }
            Some(pages)
        }
        Err(_) => None,
    };

    let max_requests_per_session = parse_u32("PARTSCOUT_MAX_REQUESTS_PER_SESSION", "15")?;
    let session_pool_size = parse_usize("PARTSCOUT_SESSION_POOL_SIZE", "3")?;
    if session_pool_size == 0 {
        return Err(invalid(
            "PARTSCOUT_SESSION_POOL_SIZE",
            "must be at least 1".to_string(),
        ));
    }
    let request_timeout_secs = parse_u64("PARTSCOUT_REQUEST_TIMEOUT_SECS", "30")?;
    let max_retries = parse_u32("PARTSCOUT_MAX_RETRIES", "1")?;

    Ok(AppConfig {
        crawl_mode,
        log_level,
        vendors_path,
        catalog_path,
        monitor_log_path,
        max_pages_per_category,
        max_requests_per_session,
        session_pool_size,
        request_timeout_secs,
        max_retries,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
