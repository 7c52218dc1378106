//! Poll adapter
//!
//! [`AvailabilityService::poll`] is the whole caller-facing contract: it
//! answers from the per-source cache, reports progress of a running job, or
//! registers and spawns a new one. It never waits on a scrape.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{Admission, CacheSettings, CacheStats, CoalescingCache, JobOutcome};
use crate::config::Config;
use crate::crawler::chain::StrategyChain;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::interact::FlowTuning;
use crate::crawler::job;
use crate::crawler::limiter::SessionLimiter;
use crate::crawler::tiers::BrowserPolicy;
use crate::crawler::webdriver::{SessionLauncher, WebDriverClient};
use crate::error::Result;
use crate::models::SourceId;
use crate::sources::{self, ChainDeps, SourceInfo};
use crate::utils::today_kst;

/// Answer to one poll, tagged by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollResponse {
    Ready {
        date: String,
        data: crate::models::AvailabilityResult,
    },
    Pending {
        date: String,
        tries: u32,
        max: u32,
    },
    Error {
        date: String,
        message: String,
    },
}

impl PollResponse {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn date(&self) -> &str {
        match self {
            Self::Ready { date, .. } | Self::Pending { date, .. } | Self::Error { date, .. } => date,
        }
    }

    fn from_outcome(date: String, outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Ready(data) => Self::Ready { date, data },
            JobOutcome::Failed { message, .. } => Self::Error { date, message },
        }
    }
}

/// Cache and chain of one source
struct SourceSlot {
    cache: Arc<CoalescingCache>,
    chain: Arc<StrategyChain>,
}

/// Entry point for availability queries across every source
pub struct AvailabilityService {
    enabled: bool,
    settings: CacheSettings,
    slots: BTreeMap<SourceId, SourceSlot>,
    limiter: SessionLimiter,
}

impl AvailabilityService {
    /// Build every source's chain from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(PageFetcher::new(&config.http)?);
        let launcher: Arc<dyn SessionLauncher> = Arc::new(WebDriverClient::new(&config.browser)?);
        let limiter = SessionLimiter::new(config.scrape.max_browser_sessions);

        let deps = ChainDeps {
            fetcher,
            launcher,
            limiter: limiter.clone(),
            policy: BrowserPolicy::from_config(&config.browser),
            tuning: FlowTuning::from_config(&config.browser),
        };

        let mut builder = Self::builder(CacheSettings::from_config(config))
            .enabled(config.scrape.enabled)
            .limiter(limiter);
        for spec in sources::catalog() {
            builder = builder.chain(sources::chain_for(spec, config, &deps));
        }

        tracing::info!(
            enabled = config.scrape.enabled,
            browser_sessions = config.scrape.max_browser_sessions,
            ttl_secs = config.scrape.cache_ttl_secs,
            ceiling_secs = config.scrape.inflight_max_secs,
            "Availability service ready"
        );
        Ok(builder.build())
    }

    /// Assemble a service from hand-built chains
    pub fn builder(settings: CacheSettings) -> ServiceBuilder {
        ServiceBuilder {
            enabled: true,
            settings,
            chains: BTreeMap::new(),
            limiter: None,
        }
    }

    /// One poll for `source` on `date` (today in KST when absent)
    pub async fn poll(&self, source: SourceId, date: Option<NaiveDate>) -> PollResponse {
        let date = date.unwrap_or_else(today_kst);
        let date_string = date.format("%Y-%m-%d").to_string();

        if !self.enabled {
            return PollResponse::Ready {
                date: date_string,
                data: sources::spec(source).skeleton(),
            };
        }

        let Some(slot) = self.slots.get(&source) else {
            return PollResponse::Error {
                date: date_string,
                message: format!("설정 오류: '{source}' 수집기가 등록되지 않았습니다"),
            };
        };

        match slot.cache.admit(date).await {
            Admission::Cached(outcome) => PollResponse::from_outcome(date_string, outcome),
            Admission::Pending { ticks } => PollResponse::Pending {
                date: date_string,
                tries: ticks,
                max: self.settings.progress_max,
            },
            Admission::Started(ticket) => {
                tracing::info!(source = %source, date = %date, "Spawning fetch job");
                job::spawn(slot.cache.clone(), slot.chain.clone(), ticket);
                PollResponse::Pending {
                    date: date_string,
                    tries: 0,
                    max: self.settings.progress_max,
                }
            }
        }
    }

    /// Catalog entries for every source
    pub fn sources(&self) -> Vec<SourceInfo> {
        sources::catalog().iter().map(|s| s.info()).collect()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limiter(&self) -> &SessionLimiter {
        &self.limiter
    }

    /// Cache occupancy per source
    pub async fn stats(&self) -> BTreeMap<SourceId, CacheStats> {
        let mut stats = BTreeMap::new();
        for (source, slot) in &self.slots {
            stats.insert(*source, slot.cache.stats().await);
        }
        stats
    }

    /// Stop handing out browser sessions; running attempts finish on their own
    pub fn shutdown(&self) {
        self.limiter.close();
        tracing::info!("Browser session limiter closed");
    }
}

/// Builder for [`AvailabilityService`]
pub struct ServiceBuilder {
    enabled: bool,
    settings: CacheSettings,
    chains: BTreeMap<SourceId, StrategyChain>,
    limiter: Option<SessionLimiter>,
}

impl ServiceBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Register the chain for its source, replacing any earlier one
    pub fn chain(mut self, chain: StrategyChain) -> Self {
        self.chains.insert(chain.source(), chain);
        self
    }

    pub fn limiter(mut self, limiter: SessionLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn build(self) -> AvailabilityService {
        let settings = self.settings;
        let slots = self
            .chains
            .into_iter()
            .map(|(source, chain)| {
                let slot = SourceSlot {
                    cache: CoalescingCache::new(source, settings.clone()),
                    chain: Arc::new(chain),
                };
                (source, slot)
            })
            .collect();

        AvailabilityService {
            enabled: self.enabled,
            settings,
            slots,
            limiter: self.limiter.unwrap_or_else(|| SessionLimiter::new(2)),
        }
    }
}
