//! Gudeok campground: date form, then a `<select>` of deck sites
//!
//! The check-in/check-out inputs are read-only and normally filled from a
//! popup picker. Injecting the values by script works most of the time;
//! the popup route is the fallback.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::crawler::interact::{
    click, dismiss_alert, js_click, pause, run_script_soft, wait_for_css, wait_for_elements,
    BrowserFlow, FlowContext,
};
use crate::crawler::webdriver::{BrowserSession, Locator};
use crate::models::{AvailabilityResult, Category, SiteId, SiteStatus};
use crate::utils::error::AutomationError;

pub const CATEGORIES: &[Category] = &[Category::Deck];

const SITE_SELECT: &str = "select[name=\"camp_num\"]";

const AGREE_ALL: &str = "input.selectAllC";

/// The "다 음" (next) control in its various renderings
const NEXT_BUTTON: &[Locator<'static>] = &[
    Locator::XPath("//span[contains(normalize-space(.),'다 음')]"),
    Locator::XPath("//button[contains(normalize-space(.),'다 음')]"),
    Locator::XPath("//a[contains(normalize-space(.),'다 음')]"),
    Locator::XPath("//input[@type='submit' and @value='다 음']"),
];

/// Wait after pressing "next" on the script path before falling back
const INJECT_CONFIRM_WAIT: Duration = Duration::from_secs(10);

const SET_DATES_SCRIPT: &str = r#"
const s = document.getElementById('sdate');
const e = document.getElementById('edate');
if (!s || !e) return false;
s.removeAttribute('readonly'); e.removeAttribute('readonly');
s.value = arguments[0]; e.value = arguments[1];
for (const el of [s, e]) {
  el.dispatchEvent(new Event('input', {bubbles: true}));
  el.dispatchEvent(new Event('change', {bubbles: true}));
}
return true;
"#;

const CHECK_AGREE_SCRIPT: &str = r#"
const a = document.querySelector('input.selectAllC');
if (a && !a.checked) { a.click(); }
return !!a;
"#;

const SITE_OPTIONS_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll('select[name="camp_num"] option[value]')).map(o => ({
  value: (o.getAttribute('value') || '').trim(),
  disabled: o.disabled || o.hasAttribute('disabled')
}));
"#;

/// One `<option>` of the site select
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteOption {
    pub value: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Disabled options are taken, enabled ones bookable; empty values are placeholders
pub fn collect_options(options: &[SiteOption]) -> AvailabilityResult {
    let mut result = AvailabilityResult::skeleton(CATEGORIES.iter().copied());
    for option in options {
        let value = option.value.trim();
        if value.is_empty() {
            continue;
        }
        let status = if option.disabled {
            SiteStatus::Unavailable
        } else {
            SiteStatus::Available
        };
        result.record(Category::Deck, SiteId::new(value), status);
    }
    result
}

/// Browser flow for the gudeok reservation form
#[derive(Debug, Clone, Copy, Default)]
pub struct GudeokFlow;

impl GudeokFlow {
    async fn press_next(&self, session: &BrowserSession) -> Result<bool, AutomationError> {
        for locator in NEXT_BUTTON {
            if let Some(button) = session.find_elements(*locator).await?.first() {
                click(session, button).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Script route; `Ok(false)` means "try the popup"
    async fn inject_dates(
        &self,
        session: &BrowserSession,
        start: &str,
        end: &str,
    ) -> Result<bool, AutomationError> {
        let set = run_script_soft(session, SET_DATES_SCRIPT, vec![json!(start), json!(end)]).await?;
        if !set.as_bool().unwrap_or(false) {
            return Ok(false);
        }

        if let Some(agree) = session.find_elements(Locator::Css(AGREE_ALL)).await?.first() {
            js_click(session, agree).await?;
            pause(200).await;
        }

        if !self.press_next(session).await? {
            return Ok(false);
        }

        match wait_for_css(session, SITE_SELECT, INJECT_CONFIRM_WAIT).await {
            Ok(()) => Ok(true),
            Err(AutomationError::Timeout(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Open the picker popup for `input_id` and click `date` in it
    async fn pick_in_popup(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
        input_id: &str,
        date: &str,
    ) -> Result<(), AutomationError> {
        let base = session.window_handle().await?;
        let before = session.window_handles().await?;

        let field = wait_for_elements(
            session,
            Locator::Css(&format!("#{input_id}")),
            ctx.bounded_wait(),
            "gudeok date input",
        )
        .await?;
        js_click(session, &field[0]).await?;

        let popup = self.wait_new_window(session, &before, ctx.bounded_wait()).await?;
        session.switch_to_window(&popup).await?;

        let day = format!("//span[contains(@onclick, \"copy('{date}')\")]");
        let picked = match wait_for_elements(
            session,
            Locator::XPath(&day),
            Duration::from_secs(15).min(ctx.bounded_wait()),
            "gudeok picker day",
        )
        .await
        {
            Ok(found) => js_click(session, &found[0]).await,
            Err(e) => Err(e),
        };

        self.switch_back(session, &base).await?;
        picked?;
        pause(200).await;
        Ok(())
    }

    async fn wait_new_window(
        &self,
        session: &BrowserSession,
        before: &[String],
        timeout: Duration,
    ) -> Result<String, AutomationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let handles = session.window_handles().await?;
            if let Some(new) = handles.into_iter().find(|h| !before.contains(h)) {
                return Ok(new);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::ElementNotFound("gudeok picker popup".into()));
            }
            pause(200).await;
        }
    }

    /// The popup closes itself after a pick; return to the form window
    async fn switch_back(&self, session: &BrowserSession, base: &str) -> Result<(), AutomationError> {
        for _ in 0..10 {
            if session.window_handles().await?.iter().any(|h| h == base) {
                return session.switch_to_window(base).await;
            }
            pause(200).await;
        }
        Err(AutomationError::Session("gudeok form window disappeared".into()))
    }

    async fn popup_route(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
        start: &str,
        end: &str,
    ) -> Result<(), AutomationError> {
        run_script_soft(session, CHECK_AGREE_SCRIPT, Vec::new()).await?;
        pause(200).await;

        self.pick_in_popup(session, ctx, "sdate", start).await?;
        self.pick_in_popup(session, ctx, "edate", end).await?;

        if !self.press_next(session).await? {
            return Err(AutomationError::ElementNotFound("gudeok next button".into()));
        }

        wait_for_elements(
            session,
            Locator::Css(SITE_SELECT),
            ctx.bounded_wait(),
            "gudeok site select",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BrowserFlow for GudeokFlow {
    fn name(&self) -> &'static str {
        "gudeok"
    }

    async fn run(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
    ) -> Result<AvailabilityResult, AutomationError> {
        let start = ctx.date_string();
        let end = (ctx.key.date + ChronoDuration::days(1))
            .format("%Y-%m-%d")
            .to_string();

        session.navigate(&ctx.page_url).await?;
        dismiss_alert(session).await?;

        if !self.inject_dates(session, &start, &end).await? {
            tracing::debug!(date = %start, "Date injection failed, using picker popup");
            ctx.ensure_time("gudeok date form")?;
            self.popup_route(session, ctx, &start, &end).await?;
        }

        let value = session.execute(SITE_OPTIONS_SCRIPT, Vec::new()).await?;
        let options: Vec<SiteOption> = serde_json::from_value(value)
            .map_err(|e| AutomationError::Protocol(format!("gudeok options: {e}")))?;

        let result = collect_options(&options);
        tracing::debug!(
            date = %start,
            options = options.len(),
            available = result.available_count(),
            "Read gudeok site select"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_options() {
        let options: Vec<SiteOption> = serde_json::from_value(json!([
            {"value": "", "disabled": false},
            {"value": "1-2", "disabled": false},
            {"value": "1-10", "disabled": true},
            {"value": " 2-1 "}
        ]))
        .unwrap();

        let result = collect_options(&options);
        let deck = result.category(Category::Deck).unwrap();
        let available: Vec<&str> = deck.available().iter().map(SiteId::as_str).collect();
        let unavailable: Vec<&str> = deck.unavailable().iter().map(SiteId::as_str).collect();
        assert_eq!(available, vec!["1-2", "2-1"]);
        assert_eq!(unavailable, vec!["1-10"]);
    }

    #[test]
    fn test_no_options_is_skeleton() {
        let result = collect_options(&[]);
        assert!(result.is_empty());
        assert!(result.category(Category::Deck).is_some());
    }
}
