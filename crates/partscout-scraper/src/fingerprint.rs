//! Browser fingerprints presented by stealth sessions.
//!
//! A session picks one fingerprint at creation and keeps it for its whole
//! life, so every request it makes looks like the same browser. Per-request
//! variation is limited to a few optional cache headers.

use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub user_agent: &'static str,
    pub viewport: Viewport,
    pub locale: &'static str,
    pub accept_language: &'static str,
    pub platform: &'static str,
}

/// Fingerprint catalog. Keep at least five entries so concurrent sessions
/// in a default-sized pool never have to share one.
pub const FINGERPRINTS: &[Fingerprint] = &[
    Fingerprint {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport: Viewport {
            width: 1920,
            height: 1080,
        },
        locale: "en-US",
        accept_language: "en-US,en;q=0.9",
        platform: "Win32",
    },
    Fingerprint {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport: Viewport {
            width: 1440,
            height: 900,
        },
        locale: "en-US",
        accept_language: "en-US,en;q=0.5",
        platform: "MacIntel",
    },
    Fingerprint {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        viewport: Viewport {
            width: 1366,
            height: 768,
        },
        locale: "en-GB",
        accept_language: "en-GB,en;q=0.8",
        platform: "Win32",
    },
    Fingerprint {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        viewport: Viewport {
            width: 1536,
            height: 864,
        },
        locale: "en-US",
        accept_language: "en-US,en;q=0.9",
        platform: "MacIntel",
    },
    Fingerprint {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport: Viewport {
            width: 1280,
            height: 720,
        },
        locale: "en-US",
        accept_language: "en-US,en;q=0.5",
        platform: "Linux x86_64",
    },
    Fingerprint {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        viewport: Viewport {
            width: 1600,
            height: 900,
        },
        locale: "en-GB",
        accept_language: "en-GB,en;q=0.5",
        platform: "Win32",
    },
];

impl Fingerprint {
    /// Picks a fingerprint at random, preferring ones whose user agent is not
    /// in `in_use`. Falls back to the whole catalog when every entry is taken.
    #[must_use]
    pub fn pick(in_use: &[&'static str]) -> &'static Fingerprint {
        let mut rng = rand::rng();
        let free: Vec<&'static Fingerprint> = FINGERPRINTS
            .iter()
            .filter(|f| !in_use.contains(&f.user_agent))
            .collect();
        free.choose(&mut rng)
            .copied()
            .or_else(|| FINGERPRINTS.choose(&mut rng))
            .unwrap_or(&FINGERPRINTS[0])
    }

    /// Headers sent on every request from a session with this fingerprint.
    ///
    /// The user agent itself is set on the client, not here.
    #[must_use]
    pub fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let viewport_width = self.viewport.width.to_string();
        let pairs: [(&'static str, &str); 9] = [
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
            ("accept-language", self.accept_language),
            ("dnt", "1"),
            ("upgrade-insecure-requests", "1"),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "none"),
            ("sec-ch-ua-platform", self.platform),
            ("viewport-width", &viewport_width),
        ];
        for (name, value) in pairs {
            if let Ok(v) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), v);
            }
        }
        headers
    }
}

/// Optional headers added to individual requests at random.
#[must_use]
pub fn random_extra_headers() -> HeaderMap {
    let mut rng = rand::rng();
    let mut headers = HeaderMap::new();
    if rng.random_bool(0.3) {
        let value = if rng.random_bool(0.5) {
            "no-cache"
        } else {
            "max-age=0"
        };
        headers.insert(
            reqwest::header::CACHE_CONTROL,
            HeaderValue::from_static(value),
        );
    }
    if rng.random_bool(0.2) {
        headers.insert(reqwest::header::PRAGMA, HeaderValue::from_static("no-cache"));
    }
    headers
}
