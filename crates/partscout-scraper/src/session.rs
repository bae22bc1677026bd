//! Pool of isolated HTTP sessions.
//!
//! Each session owns a cookie jar and a fixed browser fingerprint. Sessions
//! are handed out round-robin and replaced once they have served their
//! randomized request budget. Replacement is lazy: it happens on acquire,
//! under the slot's write lock, while requests already in flight finish on
//! the old session through their own `Arc`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use partscout_core::{AppConfig, Category, CrawlSettings};
use rand::Rng;
use reqwest::Client;
use tokio::sync::RwLock;

use crate::behavior::BehaviorConfig;
use crate::error::{FetchError, ScraperError};
use crate::fingerprint::{random_extra_headers, Fingerprint};
use crate::monitor::{RequestOutcome, SharedMonitor};
use crate::rate_limit::{retry_backoff, AdaptiveRateLimiter};

/// Bytes of an error response body kept for block classification.
const BODY_EXCERPT_CHARS: usize = 256;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub size: usize,
    pub max_requests_per_session: u32,
    pub request_timeout: Duration,
    /// Base for retry backoff: attempt `n` waits `base × (n + 1)` ±25 %.
    pub retry_backoff_base: Duration,
    pub behavior: BehaviorConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 3,
            max_requests_per_session: 15,
            request_timeout: Duration::from_secs(30),
            retry_backoff_base: Duration::from_secs(2),
            behavior: BehaviorConfig::default(),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_settings(config: &AppConfig, settings: &CrawlSettings) -> Self {
        Self {
            size: config.session_pool_size,
            max_requests_per_session: config.max_requests_per_session,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            retry_backoff_base: Duration::from_millis(settings.base_delay_ms),
            behavior: BehaviorConfig::default(),
        }
    }
}

/// Who a fetch is for. Attached to every monitor outcome.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    pub vendor: &'a str,
    pub category: Category,
}

/// One isolated browser-like HTTP session.
#[derive(Debug)]
pub struct StealthSession {
    id: u64,
    client: Client,
    fingerprint: &'static Fingerprint,
    request_count: AtomicU32,
    budget: u32,
    created_at: DateTime<Utc>,
}

impl StealthSession {
    fn build(
        id: u64,
        fingerprint: &'static Fingerprint,
        config: &PoolConfig,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(fingerprint.user_agent)
            .default_headers(fingerprint.base_headers())
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(ScraperError::SessionBuild)?;

        Ok(Self {
            id,
            client,
            fingerprint,
            request_count: AtomicU32::new(0),
            budget: request_budget(config.max_requests_per_session),
            created_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn fingerprint(&self) -> &'static Fingerprint {
        self.fingerprint
    }

    #[must_use]
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn budget(&self) -> u32 {
        self.budget
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.request_count() >= self.budget
    }

    /// Sends one GET and returns the body of a 2xx response.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Http`] on transport failures, timeouts included.
    /// - [`FetchError::UnexpectedStatus`] on any non-2xx status.
    pub async fn get(&self, url: &str) -> Result<(u16, String), FetchError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let response = self
            .client
            .get(url)
            .headers(random_extra_headers())
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
                body_excerpt: body.chars().take(BODY_EXCERPT_CHARS).collect(),
            });
        }

        let body = response.text().await?;
        Ok((status.as_u16(), body))
    }
}

/// `max` plus a random adjustment in `[-3, +5]`, never below one.
fn request_budget(max: u32) -> u32 {
    let jitter: i64 = rand::rng().random_range(-3..=5);
    u32::try_from((i64::from(max) + jitter).max(1)).unwrap_or(1)
}

/// Snapshot of one slot, for logs and reports.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub slot: usize,
    pub session_id: u64,
    pub user_agent: &'static str,
    pub request_count: u32,
    pub budget: u32,
    pub created_at: DateTime<Utc>,
}

pub struct SessionPool {
    slots: Vec<RwLock<Option<Arc<StealthSession>>>>,
    next_slot: AtomicUsize,
    next_id: AtomicU64,
    rotations: AtomicU64,
    closed: AtomicBool,
    config: PoolConfig,
    monitor: SharedMonitor,
    limiter: Arc<AdaptiveRateLimiter>,
}

impl SessionPool {
    /// Builds `config.size` sessions, each with a distinct fingerprint while
    /// the catalog allows it.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::EmptyPool`] if `config.size` is zero.
    /// - [`ScraperError::SessionBuild`] if an HTTP client cannot be built.
    pub fn new(
        config: PoolConfig,
        monitor: SharedMonitor,
        limiter: Arc<AdaptiveRateLimiter>,
    ) -> Result<Self, ScraperError> {
        if config.size == 0 {
            return Err(ScraperError::EmptyPool);
        }

        let mut in_use: Vec<&'static str> = Vec::with_capacity(config.size);
        let mut slots = Vec::with_capacity(config.size);
        for id in 0..config.size as u64 {
            let fingerprint = Fingerprint::pick(&in_use);
            in_use.push(fingerprint.user_agent);
            let session = StealthSession::build(id, fingerprint, &config)?;
            slots.push(RwLock::new(Some(Arc::new(session))));
        }

        tracing::debug!(size = config.size, "session pool ready");

        Ok(Self {
            slots,
            next_slot: AtomicUsize::new(0),
            next_id: AtomicU64::new(config.size as u64),
            rotations: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            config,
            monitor,
            limiter,
        })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of sessions replaced since the pool was built.
    #[must_use]
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<AdaptiveRateLimiter> {
        &self.limiter
    }

    #[must_use]
    pub fn monitor(&self) -> &SharedMonitor {
        &self.monitor
    }

    /// Returns the next session round-robin, rotating it first if it has
    /// used up its budget. `None` once the pool is shut down.
    pub async fn acquire_session(&self) -> Option<Arc<StealthSession>> {
        if self.is_closed() {
            return None;
        }
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed) % self.slots.len();

        {
            let guard = self.slots[slot].read().await;
            match guard.as_ref() {
                None => return None,
                Some(session) if !session.is_exhausted() => return Some(Arc::clone(session)),
                Some(_) => {}
            }
        }

        let mut guard = self.slots[slot].write().await;
        let current = guard.as_ref().map(Arc::clone)?;
        if !current.is_exhausted() {
            return Some(current);
        }

        match self.fresh_session(slot) {
            Ok(session) => {
                tracing::debug!(
                    slot,
                    retired = current.id(),
                    requests = current.request_count(),
                    replacement = session.id(),
                    "rotated session"
                );
                *guard = Some(Arc::clone(&session));
                Some(session)
            }
            Err(e) => {
                tracing::warn!(slot, error = %e, "session rotation failed, reusing old session");
                Some(current)
            }
        }
    }

    /// Replaces the session in `slot` unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::SessionBuild`] if the replacement cannot be
    /// built; the old session stays in place.
    pub async fn rotate(&self, slot: usize) -> Result<(), ScraperError> {
        let Some(lock) = self.slots.get(slot) else {
            return Ok(());
        };
        let mut guard = lock.write().await;
        if guard.is_none() {
            return Ok(());
        }
        let session = self.fresh_session(slot)?;
        *guard = Some(session);
        Ok(())
    }

    fn fresh_session(&self, slot: usize) -> Result<Arc<StealthSession>, ScraperError> {
        // Other slots may be locked by their own rotation; skip those rather
        // than wait while holding this slot's write lock.
        let in_use: Vec<&'static str> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != slot)
            .filter_map(|(_, lock)| {
                lock.try_read()
                    .ok()
                    .and_then(|g| g.as_ref().map(|s| s.fingerprint().user_agent))
            })
            .collect();
        let fingerprint = Fingerprint::pick(&in_use);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = StealthSession::build(id, fingerprint, &self.config)?;
        self.rotations.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(session))
    }

    pub async fn session_info(&self) -> Vec<SessionInfo> {
        let mut info = Vec::with_capacity(self.slots.len());
        for (slot, lock) in self.slots.iter().enumerate() {
            if let Some(s) = lock.read().await.as_ref() {
                info.push(SessionInfo {
                    slot,
                    session_id: s.id(),
                    user_agent: s.fingerprint().user_agent,
                    request_count: s.request_count(),
                    budget: s.budget(),
                    created_at: s.created_at(),
                });
            }
        }
        info
    }

    /// Fetches `url`, retrying up to `retries` extra times on any failure.
    ///
    /// Every attempt waits on the rate limiter first and is reported to the
    /// monitor and the limiter afterwards. A successful load is followed by
    /// simulated reading time. Returns `None` once retries are exhausted or
    /// when the pool is shut down.
    pub async fn fetch(&self, url: &str, retries: u32, ctx: FetchContext<'_>) -> Option<String> {
        for attempt in 0..=retries {
            let session = self.acquire_session().await?;
            self.limiter.wait().await;

            let started = Instant::now();
            let result = session.get(url).await;
            let elapsed = started.elapsed();

            match result {
                Ok((status, body)) => {
                    self.report(
                        RequestOutcome::success(
                            url,
                            ctx.vendor,
                            ctx.category,
                            elapsed,
                            status,
                            Some(body.len() as u64),
                        ),
                        true,
                    );
                    self.config.behavior.perform(url).await;
                    return Some(body);
                }
                Err(err) => {
                    self.report(
                        RequestOutcome::failure(
                            url,
                            ctx.vendor,
                            ctx.category,
                            elapsed,
                            err.status_code(),
                            err.monitor_text(),
                        ),
                        false,
                    );

                    if attempt >= retries {
                        tracing::warn!(
                            vendor = ctx.vendor,
                            category = %ctx.category,
                            url,
                            attempts = attempt + 1,
                            error = %err,
                            "fetch failed, giving up"
                        );
                        return None;
                    }

                    let delay = retry_backoff(self.config.retry_backoff_base, attempt);
                    tracing::warn!(
                        vendor = ctx.vendor,
                        category = %ctx.category,
                        url,
                        attempt,
                        retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "fetch failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        None
    }

    fn report(&self, outcome: RequestOutcome, success: bool) {
        self.limiter.record_request(success);
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(outcome);
    }

    /// Closes every session. Safe to call more than once; later fetches
    /// return `None` without touching the network.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut released = 0usize;
        for lock in &self.slots {
            if lock.write().await.take().is_some() {
                released += 1;
            }
        }
        tracing::info!(released, rotations = self.rotations(), "session pool shut down");
    }
}
