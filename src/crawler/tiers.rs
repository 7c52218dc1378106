//! The three extraction tiers: plain GET, form POST replay, browser flow

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BrowserConfig;
use crate::crawler::chain::{ChainContext, Tier, TierKind, TierOutcome};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::form::FormReplay;
use crate::crawler::interact::{BrowserFlow, FlowContext, FlowTuning};
use crate::crawler::limiter::SessionLimiter;
use crate::crawler::webdriver::SessionLauncher;
use crate::error::Error;
use crate::models::{AvailabilityResult, QueryKey};
use crate::parser::PageParser;
use crate::utils::error::AutomationError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Placeholder substituted with `YYYY-MM-DD` in page URLs
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Page URL for a date; URLs without the placeholder are used as-is
pub fn render_url(template: &str, key: &QueryKey) -> String {
    template.replace(DATE_PLACEHOLDER, &key.date_string())
}

// ============================================================================
// GET
// ============================================================================

/// Fetch the reservation page and parse it
pub struct GetTier {
    fetcher: Arc<PageFetcher>,
    url_template: String,
    parser: Arc<dyn PageParser>,
}

impl GetTier {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        url_template: impl Into<String>,
        parser: Arc<dyn PageParser>,
    ) -> Self {
        Self {
            fetcher,
            url_template: url_template.into(),
            parser,
        }
    }
}

#[async_trait]
impl Tier for GetTier {
    fn kind(&self) -> TierKind {
        TierKind::Get
    }

    async fn run(&self, ctx: &mut ChainContext) -> TierOutcome {
        let url = render_url(&self.url_template, &ctx.key);
        match self.fetcher.get(&url, None).await {
            Ok(page) => {
                let result = self.parser.parse(&page.html);
                ctx.page = Some(page);
                TierOutcome::from_result(result)
            }
            Err(e) => TierOutcome::Fault(Error::Fetch(e)),
        }
    }
}

// ============================================================================
// POST
// ============================================================================

/// Replay the page's form with the requested date
///
/// Needs the page the GET tier left in the context.
pub struct PostTier {
    fetcher: Arc<PageFetcher>,
    parser: Arc<dyn PageParser>,
}

impl PostTier {
    pub fn new(fetcher: Arc<PageFetcher>, parser: Arc<dyn PageParser>) -> Self {
        Self { fetcher, parser }
    }
}

#[async_trait]
impl Tier for PostTier {
    fn kind(&self) -> TierKind {
        TierKind::Post
    }

    async fn run(&self, ctx: &mut ChainContext) -> TierOutcome {
        let Some(page) = ctx.page.as_ref() else {
            tracing::debug!(key = %ctx.key, "No page to replay a form from");
            return TierOutcome::Empty;
        };

        let form = match FormReplay::discover(&page.html, &page.url) {
            Ok(form) => form,
            Err(e) => {
                tracing::debug!(key = %ctx.key, error = %e, "Form replay skipped");
                return TierOutcome::Empty;
            }
        };

        let payload = form.payload(ctx.key.date);
        match self
            .fetcher
            .post_form(&form.action, &payload, page.url.as_str())
            .await
        {
            Ok(response) => {
                let result = self.parser.parse(&response.html);
                ctx.page = Some(response);
                TierOutcome::from_result(result)
            }
            Err(e) => TierOutcome::Fault(Error::Fetch(e)),
        }
    }
}

// ============================================================================
// Browser
// ============================================================================

/// Timing of browser attempts
#[derive(Debug, Clone)]
pub struct BrowserPolicy {
    /// Retries after the first attempt; only session faults are retried
    pub retry: RetryConfig,
    /// Element wait on the first attempt
    pub first_wait: Duration,
    /// Element wait on retries
    pub retry_wait: Duration,
    /// Ceiling on one attempt, launch to teardown
    pub attempt_timeout: Duration,
    /// Interactive budget handed to the flow
    pub flow_budget: Duration,
}

impl BrowserPolicy {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            retry: RetryConfig::fixed(1, config.retry_delay_ms),
            first_wait: Duration::from_secs(config.wait_secs),
            retry_wait: Duration::from_secs(config.retry_wait_secs),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            flow_budget: Duration::from_secs(config.flow_budget_secs),
        }
    }

    fn wait_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            self.first_wait
        } else {
            self.retry_wait
        }
    }
}

impl Default for BrowserPolicy {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}

/// Drive a real browser through the site's flow
///
/// Every attempt holds a limiter permit and a fresh session with its own
/// profile; the session is closed whatever the flow returns.
pub struct BrowserTier {
    launcher: Arc<dyn SessionLauncher>,
    flow: Arc<dyn BrowserFlow>,
    limiter: SessionLimiter,
    page_url: String,
    policy: BrowserPolicy,
    tuning: FlowTuning,
}

impl BrowserTier {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        flow: Arc<dyn BrowserFlow>,
        limiter: SessionLimiter,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            launcher,
            flow,
            limiter,
            page_url: page_url.into(),
            policy: BrowserPolicy::default(),
            tuning: FlowTuning::default(),
        }
    }

    pub fn with_policy(mut self, policy: BrowserPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tuning(mut self, tuning: FlowTuning) -> Self {
        self.tuning = tuning;
        self
    }

    async fn attempt(
        &self,
        key: QueryKey,
        attempt: u32,
    ) -> Result<AvailabilityResult, AutomationError> {
        let _permit = self.limiter.acquire().await?;
        let started = Instant::now();
        let wait = self.policy.wait_for(attempt);

        let session = self.launcher.launch().await?;
        tracing::info!(
            key = %key,
            flow = self.flow.name(),
            attempt,
            session = session.id(),
            "Browser attempt started"
        );

        let ctx = FlowContext {
            key,
            page_url: render_url(&self.page_url, &key),
            wait,
            deadline: started
                + self.policy.flow_budget
                + wait.saturating_sub(self.policy.first_wait),
            tuning: self.tuning.clone(),
        };

        let outcome = match tokio::time::timeout(
            self.policy.attempt_timeout,
            self.flow.run(&session, &ctx),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AutomationError::Timeout(format!("{} attempt", self.flow.name()))),
        };

        session.close().await;

        tracing::info!(
            key = %key,
            flow = self.flow.name(),
            attempt,
            ok = outcome.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Browser attempt finished"
        );
        outcome
    }
}

#[async_trait]
impl Tier for BrowserTier {
    fn kind(&self) -> TierKind {
        TierKind::Browser
    }

    async fn run(&self, ctx: &mut ChainContext) -> TierOutcome {
        let key = ctx.key;
        let result = with_retry_if(
            &self.policy.retry,
            |attempt| self.attempt(key, attempt),
            AutomationError::is_session_fault,
        )
        .await;

        match result {
            Ok(result) => TierOutcome::from_result(result),
            Err(e) => TierOutcome::Fault(Error::Automation(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;
    use chrono::NaiveDate;

    #[test]
    fn test_render_url() {
        let key = QueryKey::new(SourceId::Samnak, NaiveDate::from_ymd_opt(2025, 7, 4).unwrap());
        assert_eq!(
            render_url("https://camp.test/real_time?resdate={date}&x=1", &key),
            "https://camp.test/real_time?resdate=2025-07-04&x=1"
        );
        assert_eq!(render_url("https://camp.test/book", &key), "https://camp.test/book");
    }

    #[test]
    fn test_policy_waits() {
        let policy = BrowserPolicy::default();
        assert_eq!(policy.wait_for(0), Duration::from_secs(25));
        assert_eq!(policy.wait_for(1), Duration::from_secs(30));
        assert_eq!(policy.retry.max_retries, 1);
    }
}
