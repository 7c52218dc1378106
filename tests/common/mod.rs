//! Common test utilities

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use campwatch::config::HttpConfig;
use campwatch::crawler::{ChainContext, Tier, TierKind, TierOutcome};
use campwatch::models::{AvailabilityResult, Category, SiteId, SiteStatus};

/// The date most tests query
#[allow(dead_code)]
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 4).unwrap()
}

/// HTTP settings that keep retry tests fast
#[allow(dead_code)]
pub fn fast_http() -> HttpConfig {
    HttpConfig {
        request_timeout_secs: 5,
        post_timeout_secs: 5,
        max_retries: 2,
        retry_base_delay_ms: 10,
        rate_limit: 100,
    }
}

/// Result with one site of `category`
#[allow(dead_code)]
pub fn one_site(category: Category, site: &str, status: SiteStatus) -> AvailabilityResult {
    let mut result = AvailabilityResult::new();
    result.record(category, SiteId::new(site), status);
    result
}

/// Tier that counts its runs, optionally sleeps, then returns a fixed outcome
#[allow(dead_code)]
pub struct CountingTier {
    kind: TierKind,
    delay: Duration,
    outcome: fn() -> TierOutcome,
    runs: AtomicUsize,
}

#[allow(dead_code)]
impl CountingTier {
    pub fn new(kind: TierKind, outcome: fn() -> TierOutcome) -> Arc<Self> {
        Self::slow(kind, Duration::ZERO, outcome)
    }

    pub fn slow(kind: TierKind, delay: Duration, outcome: fn() -> TierOutcome) -> Arc<Self> {
        Arc::new(Self {
            kind,
            delay,
            outcome,
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tier for CountingTier {
    fn kind(&self) -> TierKind {
        self.kind
    }

    async fn run(&self, _ctx: &mut ChainContext) -> TierOutcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.outcome)()
    }
}
