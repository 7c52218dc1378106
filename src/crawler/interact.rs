//! Browser flow contract and the page interaction helpers flows share
//!
//! A [`BrowserFlow`] drives one site's reservation UI inside an already
//! launched [`BrowserSession`]. Frame handling, element scanning and
//! polling waits live here so the per-source flows only describe the
//! clicks that are specific to their site.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BrowserConfig;
use crate::crawler::webdriver::{BrowserSession, ElementHandle, Locator};
use crate::models::{AvailabilityResult, QueryKey};
use crate::parser::ElementSignal;
use crate::utils::error::AutomationError;
use crate::utils::normalize_whitespace;

/// Interval between predicate checks in [`wait_until`]
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Collects the status-bearing attributes of every visible element
/// matching `arguments[0]`
const SCAN_SCRIPT: &str = r#"
const out = [];
for (const el of document.querySelectorAll(arguments[0])) {
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  if ((rect.width === 0 && rect.height === 0) || style.display === 'none' || style.visibility === 'hidden') {
    continue;
  }
  const img = el.querySelector('img[alt]');
  const ariaDisabled = (el.getAttribute('aria-disabled') || '').trim().toLowerCase();
  out.push({
    title: el.getAttribute('title') || '',
    aria: el.getAttribute('aria-label') || '',
    text: (el.innerText || el.textContent || '').trim(),
    classes: Array.from(el.classList),
    disabled: el.hasAttribute('disabled') || el.disabled === true,
    ariaDisabled: ariaDisabled === 'true' || ariaDisabled === '1',
    imgAlt: img ? img.getAttribute('alt') : null
  });
}
return out;
"#;

const FRAME_COUNT_SCRIPT: &str = "return window.frames.length;";

/// Calls the first global function in `arguments[0]` that exists,
/// passing `arguments[1]`; returns its name or null
const CALL_FIRST_SCRIPT: &str = r#"
const args = arguments[1] || [];
for (const name of arguments[0]) {
  if (typeof window[name] === 'function') {
    try { window[name].apply(window, args); return name; } catch (e) {}
  }
}
return null;
"#;

const JS_CLICK_SCRIPT: &str = "arguments[0].click(); return true;";

/// Knobs for the interactive parts of a flow
#[derive(Debug, Clone)]
pub struct FlowTuning {
    pub calendar_max_jumps: u32,
    pub tab_scan_attempts: u32,
    pub tab_scan_backoff: Duration,
    pub queue_wait: Duration,
}

impl FlowTuning {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            calendar_max_jumps: config.calendar_max_jumps,
            tab_scan_attempts: config.tab_scan_attempts.max(1),
            tab_scan_backoff: Duration::from_millis(config.tab_scan_backoff_ms),
            queue_wait: Duration::from_secs(config.queue_wait_secs),
        }
    }
}

impl Default for FlowTuning {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}

/// Everything a flow needs to know about the attempt it runs in
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub key: QueryKey,
    pub page_url: String,
    /// Element wait budget for this attempt
    pub wait: Duration,
    /// Past this instant the flow must give up
    pub deadline: Instant,
    pub tuning: FlowTuning,
}

impl FlowContext {
    /// `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        self.key.date_string()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fail with a timeout once the flow budget is spent
    pub fn ensure_time(&self, stage: &str) -> Result<(), AutomationError> {
        if Instant::now() >= self.deadline {
            return Err(AutomationError::Timeout(stage.to_string()));
        }
        Ok(())
    }

    /// The element wait budget, clipped to what is left of the flow budget
    pub fn bounded_wait(&self) -> Duration {
        self.wait.min(self.remaining())
    }
}

/// Site-specific browser automation
#[async_trait]
pub trait BrowserFlow: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Navigate, select the date, and read availability
    async fn run(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
    ) -> Result<AvailabilityResult, AutomationError>;
}

pub async fn pause(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Whether a script returned something truthy
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Poll `script` until it returns a truthy value
///
/// # Errors
///
/// `AutomationError::Timeout(stage)` when `timeout` elapses first
pub async fn wait_until(
    session: &BrowserSession,
    script: &str,
    args: Vec<Value>,
    timeout: Duration,
    stage: &str,
) -> Result<(), AutomationError> {
    let deadline = Instant::now() + timeout;
    loop {
        match session.execute(script, args.clone()).await {
            Ok(value) if truthy(&value) => return Ok(()),
            Ok(_) => {}
            // Page mid-navigation; try again
            Err(AutomationError::Command { .. }) => {}
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Err(AutomationError::Timeout(stage.to_string()));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until `selector` matches at least one element
pub async fn wait_for_css(
    session: &BrowserSession,
    selector: &str,
    timeout: Duration,
) -> Result<(), AutomationError> {
    wait_until(
        session,
        "return document.querySelector(arguments[0]) !== null;",
        vec![json!(selector)],
        timeout,
        &format!("wait for {selector}"),
    )
    .await
}

/// Click through JavaScript, which ignores overlays and visibility
pub async fn js_click(session: &BrowserSession, element: &ElementHandle) -> Result<(), AutomationError> {
    session.execute(JS_CLICK_SCRIPT, vec![element.to_arg()]).await?;
    Ok(())
}

/// Native click, falling back to a script click when the element is
/// covered or not interactable
pub async fn click(session: &BrowserSession, element: &ElementHandle) -> Result<(), AutomationError> {
    match session.click(element).await {
        Ok(()) => Ok(()),
        Err(AutomationError::Command { .. }) => js_click(session, element).await,
        Err(e) => Err(e),
    }
}

/// Click the first element found by any of `locators`, tried in order
///
/// Returns whether anything was clicked.
pub async fn click_first(
    session: &BrowserSession,
    locators: &[Locator<'_>],
) -> Result<bool, AutomationError> {
    for locator in locators {
        let found = match session.find_elements(*locator).await {
            Ok(found) => found,
            Err(AutomationError::Command { .. }) => continue,
            Err(e) => return Err(e),
        };
        if let Some(element) = found.first() {
            match click(session, element).await {
                Ok(()) => return Ok(true),
                Err(AutomationError::Command { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }
    Ok(false)
}

/// Poll until `locator` finds at least one element
///
/// # Errors
///
/// `AutomationError::ElementNotFound(stage)` when `timeout` elapses first
pub async fn wait_for_elements(
    session: &BrowserSession,
    locator: Locator<'_>,
    timeout: Duration,
    stage: &str,
) -> Result<Vec<ElementHandle>, AutomationError> {
    let deadline = Instant::now() + timeout;
    loop {
        match session.find_elements(locator).await {
            Ok(found) if !found.is_empty() => return Ok(found),
            Ok(_) | Err(AutomationError::Command { .. }) => {}
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Err(AutomationError::ElementNotFound(stage.to_string()));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Run a script for its side effects, tolerating page-level script errors
pub async fn run_script_soft(
    session: &BrowserSession,
    script: &str,
    args: Vec<Value>,
) -> Result<Value, AutomationError> {
    match session.execute(script, args).await {
        Ok(value) => Ok(value),
        Err(AutomationError::Command { command, error, message }) => {
            tracing::debug!(%command, %error, %message, "Page script failed");
            Ok(Value::Null)
        }
        Err(e) => Err(e),
    }
}

/// Call the first page function in `names` that exists
pub async fn call_first_function(
    session: &BrowserSession,
    names: &[&str],
    args: Vec<Value>,
) -> Result<Option<String>, AutomationError> {
    let value = session
        .execute(CALL_FIRST_SCRIPT, vec![json!(names), Value::Array(args)])
        .await?;
    Ok(value.as_str().map(str::to_string))
}

/// Read and accept an open alert
pub async fn dismiss_alert(session: &BrowserSession) -> Result<Option<String>, AutomationError> {
    let text = session.alert_text().await?;
    if text.is_some() {
        session.accept_alert().await?;
    }
    Ok(text)
}

async fn scan_current_document(
    session: &BrowserSession,
    selector: &str,
) -> Result<Vec<ElementSignal>, AutomationError> {
    let value = session.execute(SCAN_SCRIPT, vec![json!(selector)]).await?;
    let mut signals: Vec<ElementSignal> = serde_json::from_value(value)
        .map_err(|e| AutomationError::Protocol(format!("element scan: {e}")))?;
    for signal in &mut signals {
        signal.text = normalize_whitespace(&signal.text);
    }
    Ok(signals)
}

/// Signals for every visible element matching `selector`
///
/// Looks in the top document first, then in each frame in turn, and
/// returns the first non-empty set. Always leaves the session focused on
/// the top document.
pub async fn scan_signals(
    session: &BrowserSession,
    selector: &str,
) -> Result<Vec<ElementSignal>, AutomationError> {
    let signals = scan_current_document(session, selector).await?;
    if !signals.is_empty() {
        return Ok(signals);
    }

    let frames = session
        .execute(FRAME_COUNT_SCRIPT, Vec::new())
        .await?
        .as_u64()
        .unwrap_or(0) as u32;

    for index in 0..frames {
        if session.switch_to_frame(Some(index)).await.is_err() {
            session.switch_to_frame(None).await?;
            continue;
        }
        let scanned = scan_current_document(session, selector).await;
        session.switch_to_frame(None).await?;
        match scanned {
            Ok(signals) if !signals.is_empty() => {
                tracing::debug!(frame = index, count = signals.len(), "Site elements found in frame");
                return Ok(signals);
            }
            Ok(_) | Err(AutomationError::Command { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;
    use chrono::NaiveDate;

    #[test]
    fn test_truthy() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(3)));
        assert!(truthy(&json!("BookMain")));
        assert!(truthy(&json!([])));
    }

    #[test]
    fn test_scan_payload_deserializes() {
        let payload = json!([
            {"title": "예약가능", "aria": "", "text": "카라반  05", "classes": ["b1"],
             "disabled": false, "ariaDisabled": false, "imgAlt": null},
            {"text": "7", "disabled": true}
        ]);
        let signals: Vec<ElementSignal> = serde_json::from_value(payload).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].title, "예약가능");
        assert!(signals[0].image_alt.is_none());
        assert!(signals[1].disabled);
        assert!(signals[1].classes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flow_context_budget() {
        let ctx = FlowContext {
            key: QueryKey::new(SourceId::Yeongdo, NaiveDate::from_ymd_opt(2025, 7, 4).unwrap()),
            page_url: "https://example.test".into(),
            wait: Duration::from_secs(25),
            deadline: Instant::now() + Duration::from_secs(10),
            tuning: FlowTuning::default(),
        };
        assert_eq!(ctx.date_string(), "2025-07-04");
        assert_eq!(ctx.bounded_wait(), Duration::from_secs(10));
        assert!(ctx.ensure_time("calendar").is_ok());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(matches!(
            ctx.ensure_time("calendar"),
            Err(AutomationError::Timeout(stage)) if stage == "calendar"
        ));
    }

    #[test]
    fn test_tuning_from_config() {
        let tuning = FlowTuning::default();
        assert_eq!(tuning.calendar_max_jumps, 18);
        assert_eq!(tuning.tab_scan_attempts, 8);
        assert_eq!(tuning.tab_scan_backoff, Duration::from_millis(500));
    }
}
