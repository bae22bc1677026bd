//! Human-like pacing applied after each page load.
//!
//! There is no browser behind a session, so "scrolling" and "clicking" are
//! modeled as the pauses a reader would produce. What matters to the target
//! site is the timing: no two page views are followed by the same gap.

use std::time::Duration;

use partscout_core::DelayRange;
use rand::seq::IndexedRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy)]
struct BehaviorPattern {
    scroll_probability: f64,
    click_probability: f64,
}

const PATTERNS: [BehaviorPattern; 4] = [
    BehaviorPattern {
        scroll_probability: 0.3,
        click_probability: 0.1,
    },
    BehaviorPattern {
        scroll_probability: 0.5,
        click_probability: 0.05,
    },
    BehaviorPattern {
        scroll_probability: 0.2,
        click_probability: 0.15,
    },
    BehaviorPattern {
        scroll_probability: 0.4,
        click_probability: 0.08,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorStep {
    /// Scroll to a vertical offset, in pixels.
    Scroll(u32),
    ScrollToTop,
    Click,
    /// Final pause once the page is "read".
    Settle,
}

#[derive(Debug, Clone, Copy)]
pub struct BehaviorConfig {
    pub enabled: bool,
    pub post_load_pause: DelayRange,
    pub scroll_pause: DelayRange,
    pub click_pause: DelayRange,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            post_load_pause: DelayRange::from_millis(500, 2_000),
            scroll_pause: DelayRange::from_millis(300, 1_200),
            click_pause: DelayRange::from_millis(100, 500),
        }
    }
}

impl BehaviorConfig {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Draws the steps to perform after one page load. Empty when disabled.
    #[must_use]
    pub fn plan(&self) -> Vec<(BehaviorStep, Duration)> {
        if !self.enabled {
            return Vec::new();
        }

        let mut rng = rand::rng();
        let pattern = PATTERNS.choose(&mut rng).copied().unwrap_or(PATTERNS[0]);
        let mut steps = Vec::new();

        if rng.random_bool(pattern.scroll_probability) {
            let scrolls = rng.random_range(1..=3);
            for _ in 0..scrolls {
                let offset = rng.random_range(100..=1_200);
                steps.push((BehaviorStep::Scroll(offset), self.scroll_pause.sample()));
            }
            if rng.random_bool(0.3) {
                steps.push((BehaviorStep::ScrollToTop, self.scroll_pause.sample()));
            }
        }

        if rng.random_bool(pattern.click_probability) {
            steps.push((BehaviorStep::Click, self.click_pause.sample()));
        }

        steps.push((BehaviorStep::Settle, self.post_load_pause.sample()));
        steps
    }

    /// Plays a plan by sleeping through each step's pause.
    pub async fn perform(&self, url: &str) {
        let plan = self.plan();
        if plan.is_empty() {
            return;
        }
        let total: Duration = plan.iter().map(|(_, d)| *d).sum();
        tracing::trace!(
            url,
            steps = plan.len(),
            total_ms = u64::try_from(total.as_millis()).unwrap_or(u64::MAX),
            "simulating reader"
        );
        for (_, pause) in plan {
            tokio::time::sleep(pause).await;
        }
    }
}
