//! Mode-dependent crawl tuning: concurrency, page caps, and delay ranges.

use std::time::Duration;

use rand::Rng;

use crate::app_config::{AppConfig, CrawlMode};

/// Inclusive range of delays, in milliseconds, sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    #[must_use]
    pub const fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    #[must_use]
    pub const fn from_secs(min_secs: u64, max_secs: u64) -> Self {
        Self::from_millis(min_secs * 1_000, max_secs * 1_000)
    }

    /// A range that always yields zero. Used by tests and dry runs.
    #[must_use]
    pub const fn zero() -> Self {
        Self::from_millis(0, 0)
    }

    /// Samples a delay uniformly from the range. A degenerate or inverted
    /// range yields `min_ms`.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }
}

/// Full crawl tuning for one run.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub mode: CrawlMode,
    /// Upper bound on in-flight product fetches within a batch.
    pub max_concurrent_requests: usize,
    pub max_pages_per_category: usize,
    pub batch_size: usize,
    /// Base delay fed to the adaptive rate limiter, in milliseconds.
    pub base_delay_ms: u64,
    pub page_delay: DelayRange,
    pub vendor_delay: DelayRange,
    pub category_delay: DelayRange,
    pub batch_delay: DelayRange,
    pub high_error_delay: DelayRange,
    /// Batch error rate above which the elevated cooldown is used.
    pub error_threshold: f64,
    /// Release completed batch buffers every `gc_frequency` batches.
    pub gc_frequency: usize,
    pub randomize_order: bool,
    pub max_retries: u32,
}

impl CrawlSettings {
    /// Returns the settings for a crawl mode with every other knob at its
    /// default.
    #[must_use]
    pub fn for_mode(mode: CrawlMode) -> Self {
        let (concurrency, pages, base_delay, vendor_delay, category_delay) = match mode {
            CrawlMode::Conservative => (
                2,
                3,
                DelayRange::from_millis(3_000, 8_000),
                DelayRange::from_secs(15, 25),
                DelayRange::from_secs(20, 30),
            ),
            CrawlMode::Balanced => (
                3,
                5,
                DelayRange::from_millis(1_500, 4_000),
                DelayRange::from_secs(8, 15),
                DelayRange::from_secs(10, 20),
            ),
            CrawlMode::Aggressive => (
                4,
                7,
                DelayRange::from_millis(1_000, 2_500),
                DelayRange::from_secs(5, 10),
                DelayRange::from_secs(8, 15),
            ),
        };

        Self {
            mode,
            max_concurrent_requests: concurrency,
            max_pages_per_category: pages,
            batch_size: 15,
            // The limiter jitters around its base, so use the midpoint.
            base_delay_ms: (base_delay.min_ms + base_delay.max_ms) / 2,
            page_delay: DelayRange::from_secs(4, 8),
            vendor_delay,
            category_delay,
            batch_delay: DelayRange::from_secs(3, 6),
            high_error_delay: DelayRange::from_secs(8, 15),
            error_threshold: 0.3,
            gc_frequency: 2,
            randomize_order: true,
            max_retries: 1,
        }
    }

    /// Builds settings from the application config: the mode's defaults,
    /// then any explicit overrides.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let mut settings = Self::for_mode(config.crawl_mode);
        if let Some(pages) = config.max_pages_per_category {
            settings.max_pages_per_category = pages;
        }
        settings.max_retries = config.max_retries;
        settings
    }

    /// Settings with every delay zeroed, for tests against local servers.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.base_delay_ms = 0;
        self.page_delay = DelayRange::zero();
        self.vendor_delay = DelayRange::zero();
        self.category_delay = DelayRange::zero();
        self.batch_delay = DelayRange::zero();
        self.high_error_delay = DelayRange::zero();
        self
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::for_mode(CrawlMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_select_expected_concurrency_and_page_cap() {
        let conservative = CrawlSettings::for_mode(CrawlMode::Conservative);
        let balanced = CrawlSettings::for_mode(CrawlMode::Balanced);
        let aggressive = CrawlSettings::for_mode(CrawlMode::Aggressive);

        assert_eq!(conservative.max_concurrent_requests, 2);
        assert_eq!(balanced.max_concurrent_requests, 3);
        assert_eq!(aggressive.max_concurrent_requests, 4);

        assert_eq!(conservative.max_pages_per_category, 3);
        assert_eq!(balanced.max_pages_per_category, 5);
        assert_eq!(aggressive.max_pages_per_category, 7);
    }

    #[test]
    fn conservative_waits_longer_than_aggressive() {
        let conservative = CrawlSettings::for_mode(CrawlMode::Conservative);
        let aggressive = CrawlSettings::for_mode(CrawlMode::Aggressive);
        assert!(conservative.base_delay_ms > aggressive.base_delay_ms);
        assert!(conservative.vendor_delay.min_ms > aggressive.vendor_delay.min_ms);
        assert!(conservative.category_delay.min_ms > aggressive.category_delay.min_ms);
    }

    #[test]
    fn sample_stays_within_range() {
        let range = DelayRange::from_millis(100, 200);
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn degenerate_range_yields_min() {
        assert_eq!(DelayRange::from_millis(50, 50).sample(), Duration::from_millis(50));
        assert_eq!(DelayRange::from_millis(80, 10).sample(), Duration::from_millis(80));
        assert_eq!(DelayRange::zero().sample(), Duration::ZERO);
    }

    #[test]
    fn without_delays_zeroes_every_range() {
        let s = CrawlSettings::default().without_delays();
        assert_eq!(s.base_delay_ms, 0);
        assert!(s.page_delay.is_zero());
        assert!(s.batch_delay.is_zero());
        assert!(s.high_error_delay.is_zero());
        assert!(s.vendor_delay.is_zero());
        assert!(s.category_delay.is_zero());
    }
}
