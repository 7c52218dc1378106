//! Fetching and browser automation
//!
//! Everything that talks to the reservation sites:
//!
//! - [`fetcher`] - rate-limited HTTP client behind the GET and POST tiers
//! - [`form`] - form discovery and replay payloads
//! - [`webdriver`] - W3C WebDriver sessions with disposable profiles
//! - [`limiter`] - process-wide browser session cap
//! - [`interact`] - browser flow contract and shared page helpers
//! - [`chain`] / [`tiers`] - ordered extraction with union merge
//! - [`job`] - one chain run committed to the cache

pub mod chain;
pub mod fetcher;
pub mod form;
pub mod interact;
pub mod job;
pub mod limiter;
pub mod tiers;
pub mod webdriver;

pub use chain::{ChainContext, Completeness, StrategyChain, Tier, TierKind, TierOutcome};
pub use fetcher::{FetchedPage, PageFetcher};
pub use interact::{BrowserFlow, FlowContext, FlowTuning};
pub use limiter::{SessionLimiter, SessionPermit};
pub use tiers::{BrowserPolicy, BrowserTier, GetTier, PostTier};
pub use webdriver::{BrowserSession, SessionLauncher, WebDriverClient};
