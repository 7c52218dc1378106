//! Per-source coalescing cache
//!
//! Holds finished results (with a TTL) and the registry of in-flight jobs
//! for one source, all behind a single async mutex. [`CoalescingCache::admit`]
//! is the atomic check-cache / clear-stale / check-in-flight / register
//! sequence that guarantees at most one job per date.
//!
//! # Example
//!
//! ```rust,ignore
//! use campwatch::cache::{Admission, CacheSettings, CoalescingCache};
//!
//! let cache = CoalescingCache::new(SourceId::Yeongdo, CacheSettings::default());
//! match cache.admit(date).await {
//!     Admission::Cached(outcome) => { /* serve it */ }
//!     Admission::Pending { ticks } => { /* someone is already on it */ }
//!     Admission::Started(ticket) => { /* spawn the job, then cache.complete(ticket, ..) */ }
//! }
//! ```

pub mod ticker;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{Error, ErrorCategory, ScrapeErrorTrait};
use crate::models::{AvailabilityResult, QueryKey, SourceId};

/// Final outcome of a job, as cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Ready(AvailabilityResult),
    Failed {
        category: ErrorCategory,
        message: String,
    },
}

impl JobOutcome {
    /// Failed outcome with a user-facing Korean message
    pub fn from_error(err: &Error) -> Self {
        let category = err.category();
        Self::Failed {
            category,
            message: format!("{}: {}", category.korean_desc(), err.korean_desc()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Cache timing
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// How long a finished outcome is served
    pub ttl: Duration,
    /// Age after which an in-flight entry may be force-cleared
    pub inflight_ceiling: Duration,
    /// Progress counter ceiling
    pub progress_max: u32,
    /// Progress tick period
    pub tick_interval: Duration,
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: config.cache_ttl(),
            inflight_ceiling: config.inflight_ceiling(),
            progress_max: config.scrape.progress_max,
            tick_interval: config.tick_interval(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Proof of in-flight registration, handed to the job that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTicket {
    pub key: QueryKey,
    pub generation: u64,
}

/// Result of [`CoalescingCache::try_begin_job`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginJob {
    AlreadyRunning { ticks: u32 },
    Started(JobTicket),
}

/// Result of [`CoalescingCache::admit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A fresh outcome was cached
    Cached(JobOutcome),
    /// A job is already running
    Pending { ticks: u32 },
    /// Registered a new job; the caller must run it and complete the ticket
    Started(JobTicket),
}

/// Entry counts for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cached: usize,
    pub in_flight: usize,
}

#[derive(Debug)]
struct CacheEntry {
    outcome: JobOutcome,
    inserted: Instant,
}

#[derive(Debug)]
struct InFlightEntry {
    started: Instant,
    ticks: u32,
    generation: u64,
}

#[derive(Debug, Default)]
struct State {
    cache: HashMap<NaiveDate, CacheEntry>,
    in_flight: HashMap<NaiveDate, InFlightEntry>,
    next_generation: u64,
}

impl State {
    fn fresh_outcome(&mut self, date: NaiveDate, ttl: Duration) -> Option<JobOutcome> {
        let entry = self.cache.get(&date)?;
        if entry.inserted.elapsed() <= ttl {
            return Some(entry.outcome.clone());
        }
        self.cache.remove(&date);
        None
    }

    fn clear_stale(&mut self, date: NaiveDate, ceiling: Duration) -> bool {
        let stale = self
            .in_flight
            .get(&date)
            .is_some_and(|entry| entry.started.elapsed() > ceiling);
        if stale {
            self.in_flight.remove(&date);
        }
        stale
    }

    fn register(&mut self, date: NaiveDate) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.in_flight.insert(
            date,
            InFlightEntry {
                started: Instant::now(),
                ticks: 0,
                generation,
            },
        );
        generation
    }
}

/// Result cache plus in-flight registry for one source
#[derive(Debug)]
pub struct CoalescingCache {
    source: SourceId,
    settings: CacheSettings,
    state: Mutex<State>,
}

impl CoalescingCache {
    pub fn new(source: SourceId, settings: CacheSettings) -> Arc<Self> {
        Arc::new(Self {
            source,
            settings,
            state: Mutex::new(State::default()),
        })
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Cached outcome for `date` if still within TTL; expired entries are evicted
    pub async fn lookup(&self, date: NaiveDate) -> Option<JobOutcome> {
        let mut state = self.state.lock().await;
        state.fresh_outcome(date, self.settings.ttl)
    }

    /// Register a job for `date` unless one is already running
    pub async fn try_begin_job(self: &Arc<Self>, date: NaiveDate) -> BeginJob {
        let generation = {
            let mut state = self.state.lock().await;
            if let Some(entry) = state.in_flight.get(&date) {
                return BeginJob::AlreadyRunning { ticks: entry.ticks };
            }
            state.register(date)
        };
        BeginJob::Started(self.started(date, generation))
    }

    /// Remove the in-flight entry for `date` if it is older than the ceiling
    pub async fn clear_stale(&self, date: NaiveDate) -> bool {
        let mut state = self.state.lock().await;
        state.clear_stale(date, self.settings.inflight_ceiling)
    }

    /// The full poll decision under one lock acquisition
    pub async fn admit(self: &Arc<Self>, date: NaiveDate) -> Admission {
        let generation = {
            let mut state = self.state.lock().await;

            if let Some(outcome) = state.fresh_outcome(date, self.settings.ttl) {
                return Admission::Cached(outcome);
            }

            if state.clear_stale(date, self.settings.inflight_ceiling) {
                tracing::warn!(
                    source = %self.source,
                    date = %date,
                    ceiling_secs = self.settings.inflight_ceiling.as_secs(),
                    "Cleared stale in-flight entry"
                );
            }

            if let Some(entry) = state.in_flight.get(&date) {
                return Admission::Pending { ticks: entry.ticks };
            }

            state.register(date)
        };
        Admission::Started(self.started(date, generation))
    }

    fn started(self: &Arc<Self>, date: NaiveDate, generation: u64) -> JobTicket {
        tracing::debug!(source = %self.source, date = %date, generation, "Job registered");
        ticker::spawn(Arc::clone(self), date, generation);
        JobTicket {
            key: QueryKey::new(self.source, date),
            generation,
        }
    }

    /// Store a job's outcome and release its registration
    ///
    /// The outcome always replaces the cache entry. The in-flight entry is
    /// only removed if it still belongs to this ticket's generation.
    pub async fn complete(&self, ticket: JobTicket, outcome: JobOutcome) {
        let date = ticket.key.date;
        let mut state = self.state.lock().await;

        let ready = outcome.is_ready();
        state.cache.insert(
            date,
            CacheEntry {
                outcome,
                inserted: Instant::now(),
            },
        );

        let owned = state
            .in_flight
            .get(&date)
            .is_some_and(|entry| entry.generation == ticket.generation);
        if owned {
            state.in_flight.remove(&date);
        }

        tracing::debug!(
            source = %self.source,
            date = %date,
            generation = ticket.generation,
            ready,
            released = owned,
            "Job completed"
        );
    }

    /// Advance the progress counter of `generation`'s entry
    ///
    /// Returns `false` once the entry is gone or owned by another
    /// generation, which stops the ticker.
    pub async fn tick(&self, date: NaiveDate, generation: u64) -> bool {
        let mut state = self.state.lock().await;
        match state.in_flight.get_mut(&date) {
            Some(entry) if entry.generation == generation => {
                entry.ticks = (entry.ticks + 1).min(self.settings.progress_max);
                true
            }
            _ => false,
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            cached: state.cache.len(),
            in_flight: state.in_flight.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, SiteId, SiteStatus};
    use crate::utils::error::AutomationError;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 4).unwrap()
    }

    fn ready() -> JobOutcome {
        let mut result = AvailabilityResult::skeleton([Category::Caravan]);
        result.record(Category::Caravan, SiteId::new("1"), SiteStatus::Available);
        JobOutcome::Ready(result)
    }

    fn cache() -> Arc<CoalescingCache> {
        CoalescingCache::new(SourceId::Yeongdo, CacheSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_registers_once() {
        let cache = cache();
        let ticket = match cache.admit(date()).await {
            Admission::Started(ticket) => ticket,
            other => panic!("expected Started, got {other:?}"),
        };
        assert_eq!(ticket.key, QueryKey::new(SourceId::Yeongdo, date()));
        assert_eq!(cache.admit(date()).await, Admission::Pending { ticks: 0 });
        assert_eq!(
            cache.try_begin_job(date()).await,
            BeginJob::AlreadyRunning { ticks: 0 }
        );
        assert_eq!(cache.stats().await, CacheStats { cached: 0, in_flight: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_caches_and_releases() {
        let cache = cache();
        let BeginJob::Started(ticket) = cache.try_begin_job(date()).await else {
            panic!("expected a new job");
        };
        cache.complete(ticket, ready()).await;

        assert_eq!(cache.lookup(date()).await, Some(ready()));
        assert_eq!(cache.admit(date()).await, Admission::Cached(ready()));
        assert_eq!(cache.stats().await, CacheStats { cached: 1, in_flight: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_evicts() {
        let cache = cache();
        let BeginJob::Started(ticket) = cache.try_begin_job(date()).await else {
            panic!("expected a new job");
        };
        cache.complete(ticket, ready()).await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.lookup(date()).await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.lookup(date()).await.is_none());
        assert_eq!(cache.stats().await.cached, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_replaced_and_old_job_cannot_release_new() {
        let cache = cache();
        let Admission::Started(old) = cache.admit(date()).await else {
            panic!("expected a new job");
        };

        tokio::time::advance(Duration::from_secs(100)).await;
        assert!(!cache.clear_stale(date()).await);

        tokio::time::advance(Duration::from_secs(1)).await;
        let Admission::Started(new) = cache.admit(date()).await else {
            panic!("stale entry should have been replaced");
        };
        assert_ne!(old.generation, new.generation);

        // Displaced job finishes: result is cached, successor stays registered
        cache.complete(old, ready()).await;
        assert_eq!(cache.stats().await, CacheStats { cached: 1, in_flight: 1 });

        cache.complete(new, ready()).await;
        assert_eq!(cache.stats().await.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_saturates_and_respects_generation() {
        let settings = CacheSettings {
            progress_max: 2,
            // Keep the spawned ticker out of the way
            tick_interval: Duration::from_secs(3600),
            ..CacheSettings::default()
        };
        let cache = CoalescingCache::new(SourceId::Gudeok, settings);
        let BeginJob::Started(ticket) = cache.try_begin_job(date()).await else {
            panic!("expected a new job");
        };

        for _ in 0..5 {
            assert!(cache.tick(date(), ticket.generation).await);
        }
        assert_eq!(cache.admit(date()).await, Admission::Pending { ticks: 2 });
        assert!(!cache.tick(date(), ticket.generation + 1).await);

        cache.complete(ticket, ready()).await;
        assert!(!cache.tick(date(), ticket.generation).await);
    }

    #[test]
    fn test_failed_outcome_message() {
        let err = Error::Automation(AutomationError::Session("chrome not reachable".into()));
        match JobOutcome::from_error(&err) {
            JobOutcome::Failed { category, message } => {
                assert_eq!(category, ErrorCategory::Automation);
                assert!(message.starts_with("브라우저 자동화 오류: "));
            }
            JobOutcome::Ready(_) => panic!("expected failure"),
        }
    }
}
