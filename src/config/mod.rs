//! Configuration management for campwatch
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Every section has defaults, so a config file
//! only needs the keys it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::crawler::chain::Completeness;
use crate::models::SourceId;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache, coalescing and session limits
    pub scrape: ScrapeConfig,

    /// Plain HTTP tiers
    pub http: HttpConfig,

    /// Browser automation tier
    pub browser: BrowserConfig,

    /// HTTP surface
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Per-source URL overrides, keyed by source id (`yeongdo`, `busan_port`, ...)
    pub sources: BTreeMap<String, SourceOverride>,
}

/// Scraping behaviour shared by every source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// When false, polls answer with empty skeletons and no job is started
    pub enabled: bool,

    /// Process-wide cap on concurrent browser sessions
    pub max_browser_sessions: usize,

    /// How long a finished result is served from cache
    pub cache_ttl_secs: u64,

    /// Age after which an in-flight job is considered stuck and replaced
    pub inflight_max_secs: u64,

    /// Upper bound reported for the progress counter
    pub progress_max: u32,

    /// Progress ticker period
    pub tick_interval_ms: u64,
}

/// HTTP client settings for the GET and POST tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// GET timeout in seconds
    pub request_timeout_secs: u64,

    /// Form POST timeout in seconds
    pub post_timeout_secs: u64,

    /// Retries on 429/5xx
    pub max_retries: u32,

    /// Backoff base between those retries
    pub retry_base_delay_ms: u64,

    /// Requests per second across all sources
    pub rate_limit: u32,
}

/// WebDriver / Chrome settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// chromedriver (or any W3C WebDriver) endpoint
    pub webdriver_url: String,

    /// Explicit Chrome binary, if not on the driver's default path
    pub chrome_binary: Option<String>,

    pub headless: bool,

    /// `width,height`
    pub window_size: String,

    pub user_agent: String,

    pub page_load_timeout_secs: u64,

    pub script_timeout_secs: u64,

    /// Element wait budget on the first attempt
    pub wait_secs: u64,

    /// Element wait budget on the retry attempt
    pub retry_wait_secs: u64,

    /// Hard ceiling on a single attempt, session launch to teardown
    pub attempt_timeout_secs: u64,

    /// Pause before the retry attempt
    pub retry_delay_ms: u64,

    /// "Next month" actions allowed while looking for the target date
    pub calendar_max_jumps: u32,

    /// Re-scans per category tab
    pub tab_scan_attempts: u32,

    pub tab_scan_backoff_ms: u64,

    /// Wall-clock budget for the interactive part of a flow
    pub flow_budget_secs: u64,

    /// How long to sit in a ticketing queue page
    pub queue_wait_secs: u64,
}

/// HTTP surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    pub enable_cors: bool,

    pub enable_request_logging: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

/// Per-source overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverride {
    /// Replaces the page URL (or URL template for real-time boards)
    pub url: Option<String>,

    /// `any_site` stops at the first tier with data; `every_category`
    /// keeps running tiers and merging until each category has a site
    pub completeness: Option<Completeness>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_browser_sessions: 2,
            cache_ttl_secs: 60,
            inflight_max_secs: 100,
            progress_max: 60,
            tick_interval_ms: 1000,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 20,
            post_timeout_secs: 15,
            max_retries: 2,
            retry_base_delay_ms: 500,
            rate_limit: 4,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: String::from("http://127.0.0.1:9515"),
            chrome_binary: None,
            headless: true,
            window_size: String::from("1280,2000"),
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
            page_load_timeout_secs: 20,
            script_timeout_secs: 20,
            wait_secs: 25,
            retry_wait_secs: 30,
            attempt_timeout_secs: 90,
            retry_delay_ms: 1500,
            calendar_max_jumps: 18,
            tab_scan_attempts: 8,
            tab_scan_backoff_ms: 500,
            flow_budget_secs: 40,
            queue_wait_secs: 35,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:8080"),
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Overlay `CAMPWATCH_*` environment variables onto this configuration
    pub fn apply_env(&mut self) {
        if let Some(disabled) = env_flag("CAMPWATCH_DISABLE_SCRAPERS") {
            self.scrape.enabled = !disabled;
        }
        if let Some(v) = env_parse("CAMPWATCH_MAX_BROWSER_SESSIONS") {
            self.scrape.max_browser_sessions = v;
        }
        if let Some(v) = env_parse("CAMPWATCH_INFLIGHT_MAX_SECS") {
            self.scrape.inflight_max_secs = v;
        }
        if let Some(v) = env_parse("CAMPWATCH_CACHE_TTL_SECS") {
            self.scrape.cache_ttl_secs = v;
        }
        if let Some(v) = env_parse("CAMPWATCH_REQUEST_TIMEOUT") {
            self.http.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("CAMPWATCH_RATE_LIMIT") {
            self.http.rate_limit = v;
        }
        if let Ok(v) = std::env::var("CAMPWATCH_WEBDRIVER_URL") {
            self.browser.webdriver_url = v;
        }
        if let Ok(v) = std::env::var("CAMPWATCH_CHROME_BIN") {
            self.browser.chrome_binary = Some(v);
        }
        if let Some(v) = env_flag("CAMPWATCH_HEADLESS") {
            self.browser.headless = v;
        }
        if let Ok(v) = std::env::var("CAMPWATCH_BIND") {
            self.server.bind_address = v;
        }
        if let Ok(v) = std::env::var("CAMPWATCH_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("CAMPWATCH_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scrape.max_browser_sessions == 0 {
            anyhow::bail!("max_browser_sessions must be greater than 0");
        }

        if self.scrape.cache_ttl_secs == 0 {
            anyhow::bail!("cache_ttl_secs must be greater than 0");
        }

        if self.scrape.inflight_max_secs == 0 {
            anyhow::bail!("inflight_max_secs must be greater than 0");
        }

        if self.scrape.progress_max == 0 || self.scrape.tick_interval_ms == 0 {
            anyhow::bail!("progress_max and tick_interval_ms must be greater than 0");
        }

        if self.http.rate_limit == 0 {
            anyhow::bail!("rate_limit must be positive");
        }

        if self.browser.retry_wait_secs < self.browser.wait_secs {
            anyhow::bail!("retry_wait_secs must not be shorter than wait_secs");
        }

        url::Url::parse(&self.browser.webdriver_url)
            .with_context(|| format!("Invalid webdriver_url: {}", self.browser.webdriver_url))?;

        self.bind_address()?;

        Ok(())
    }

    /// Parsed server bind address
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind_address: {}", self.server.bind_address))
    }

    /// URL override for a source, if any
    pub fn source_url(&self, source: SourceId) -> Option<&str> {
        self.sources
            .get(source.as_str())
            .and_then(|o| o.url.as_deref())
    }

    /// Completeness override for a source, if any
    pub fn source_completeness(&self, source: SourceId) -> Option<Completeness> {
        self.sources.get(source.as_str()).and_then(|o| o.completeness)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.scrape.cache_ttl_secs)
    }

    #[must_use]
    pub fn inflight_ceiling(&self) -> Duration {
        Duration::from_secs(self.scrape.inflight_max_secs)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.scrape.tick_interval_ms)
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }
}
