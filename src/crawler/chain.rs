//! Ordered extraction tiers with union merge
//!
//! A [`StrategyChain`] runs its tiers cheapest first (GET, form POST,
//! browser). Each tier reports an explicit [`TierOutcome`]; data is merged
//! into one result per category, with the later tier winning when the same
//! site shows up in both buckets. The chain stops as soon as the merged
//! result satisfies the source's [`Completeness`] policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::crawler::fetcher::FetchedPage;
use crate::error::{Error, Result};
use crate::models::{AvailabilityResult, Category, QueryKey, SourceId};

/// Extraction strategy family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    Get,
    Post,
    Browser,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Browser => "browser",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tier found
#[derive(Debug)]
pub enum TierOutcome {
    /// At least one site was extracted
    Data(AvailabilityResult),
    /// The tier ran but found nothing usable
    Empty,
    /// The tier failed
    Fault(Error),
}

impl TierOutcome {
    /// `Data` when the result has any site, `Empty` otherwise
    pub fn from_result(result: AvailabilityResult) -> Self {
        if result.is_empty() {
            Self::Empty
        } else {
            Self::Data(result)
        }
    }
}

/// State shared by the tiers of one chain run
#[derive(Debug)]
pub struct ChainContext {
    pub key: QueryKey,
    /// Last page fetched over plain HTTP; the POST tier replays its form
    pub page: Option<FetchedPage>,
}

impl ChainContext {
    pub fn new(key: QueryKey) -> Self {
        Self { key, page: None }
    }
}

/// One extraction strategy
#[async_trait]
pub trait Tier: Send + Sync {
    fn kind(&self) -> TierKind;

    async fn run(&self, ctx: &mut ChainContext) -> TierOutcome;
}

/// When the chain may stop early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    /// Any site in any category
    #[default]
    AnySite,
    /// At least one site in every category
    EveryCategory,
}

impl Completeness {
    pub fn satisfied(&self, result: &AvailabilityResult) -> bool {
        match self {
            Self::AnySite => !result.is_empty(),
            Self::EveryCategory => result.every_category_filled(),
        }
    }
}

/// The tiers configured for one source
pub struct StrategyChain {
    source: SourceId,
    categories: Vec<Category>,
    tiers: Vec<Arc<dyn Tier>>,
    completeness: Completeness,
    config_error: Option<String>,
}

impl StrategyChain {
    pub fn new(source: SourceId, categories: impl Into<Vec<Category>>) -> Self {
        Self {
            source,
            categories: categories.into(),
            tiers: Vec::new(),
            completeness: Completeness::default(),
            config_error: None,
        }
    }

    /// A chain that refuses to run because its source is misconfigured
    pub fn misconfigured(
        source: SourceId,
        categories: impl Into<Vec<Category>>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            config_error: Some(reason.into()),
            ..Self::new(source, categories)
        }
    }

    /// Append a tier; tiers run in insertion order
    pub fn tier(mut self, tier: Arc<dyn Tier>) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn completeness(mut self, completeness: Completeness) -> Self {
        self.completeness = completeness;
        self
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn stop_policy(&self) -> Completeness {
        self.completeness
    }

    pub fn tier_kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|t| t.kind()).collect()
    }

    /// Empty result listing every category of this source
    pub fn skeleton(&self) -> AvailabilityResult {
        AvailabilityResult::skeleton(self.categories.iter().copied())
    }

    /// Run the tiers for `key`
    ///
    /// Any data found is returned even if a later tier faulted. Without
    /// data, an automation or configuration fault becomes the error;
    /// otherwise the empty skeleton is returned.
    pub async fn run(&self, key: QueryKey) -> Result<AvailabilityResult> {
        if let Some(reason) = &self.config_error {
            return Err(Error::config(reason.clone()));
        }

        let mut ctx = ChainContext::new(key);
        let mut merged = self.skeleton();
        let mut fault: Option<Error> = None;

        for tier in &self.tiers {
            let kind = tier.kind();
            let started = Instant::now();
            let outcome = tier.run(&mut ctx).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                TierOutcome::Data(result) => {
                    tracing::info!(
                        source = %self.source,
                        date = %key.date,
                        tier = %kind,
                        sites = result.site_count(),
                        elapsed_ms,
                        "Tier produced data"
                    );
                    merged.merge_from(&result);
                    if self.completeness.satisfied(&merged) {
                        break;
                    }
                }
                TierOutcome::Empty => {
                    tracing::debug!(
                        source = %self.source,
                        date = %key.date,
                        tier = %kind,
                        elapsed_ms,
                        "Tier found nothing, falling through"
                    );
                }
                TierOutcome::Fault(err) => {
                    tracing::warn!(
                        source = %self.source,
                        date = %key.date,
                        tier = %kind,
                        elapsed_ms,
                        error = %err,
                        "Tier failed"
                    );
                    if err.surfaces_to_caller() {
                        fault = Some(err);
                    }
                }
            }
        }

        match fault {
            Some(err) if merged.is_empty() => Err(err),
            _ => Ok(merged),
        }
    }
}
