//! campwatch - live campsite availability for Korean public campgrounds
//!
//! Scrapes reservation sites that expose no API, behind a per-source
//! coalescing cache so that any number of pollers share one fetch job.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Sources, categories, sites and availability results
//! - [`parser`] - Status classifier, label extraction and HTML parsing
//! - [`crawler`] - HTTP fetching, WebDriver sessions and the tier chain
//! - [`sources`] - Source catalog, per-site parsers and browser flows
//! - [`cache`] - Coalescing cache, in-flight registry and progress ticker
//! - [`service`] - The poll contract
//! - [`server`] - HTTP surface over the poll contract
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use campwatch::config::Config;
//! use campwatch::models::SourceId;
//! use campwatch::service::AvailabilityService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let service = AvailabilityService::from_config(&config)?;
//!     let response = service.poll(SourceId::Yeongdo, None).await;
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod server;
pub mod service;
pub mod sources;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheSettings, CoalescingCache, JobOutcome};
    pub use crate::config::Config;
    pub use crate::crawler::{StrategyChain, Tier, TierKind, TierOutcome};
    pub use crate::error::{Error, ErrorCategory, Result, ScrapeErrorTrait};
    pub use crate::models::{AvailabilityResult, Category, QueryKey, SiteId, SiteStatus, SourceId};
    pub use crate::service::{AvailabilityService, PollResponse};
}

// Direct re-exports for convenience
pub use models::{AvailabilityResult, Category, QueryKey, SiteId, SiteStatus, SourceId};
