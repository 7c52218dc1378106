//! Yeongdo marine camping: date calendar plus category radio tabs
//!
//! The static page already renders site buttons for the GET and POST
//! tiers. The browser flow clicks the date in the calendar, then switches
//! through the caravan / auto / general tabs and reads the visible
//! `.b1` buttons of each.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::crawler::interact::{
    call_first_function, click, click_first, dismiss_alert, pause, run_script_soft,
    scan_signals, wait_for_elements, wait_until, BrowserFlow, FlowContext,
};
use crate::crawler::webdriver::{BrowserSession, Locator};
use crate::models::{AvailabilityResult, Category};
use crate::parser::{classify, parse_site_label, ElementSignal};
use crate::utils::error::AutomationError;

/// Categories in tab order
pub const CATEGORIES: &[Category] = &[Category::Caravan, Category::Auto, Category::General];

/// Visible site buttons
pub const SITE_BUTTONS: &str = "button.b1, a.b1";

/// "Next month" controls seen on the calendar, tried in order
const NEXT_MONTH: &[Locator<'static>] = &[
    Locator::Css(".ui-datepicker-next"),
    Locator::Css(".ui-datepicker-next > a"),
    Locator::Css(".btn.next"),
    Locator::Css("button.next"),
    Locator::Css("a.next"),
    Locator::Css(".calendar .next"),
    Locator::Css(".cal-next"),
    Locator::Css(".month-next"),
    Locator::Css("a[title=\"다음달\"]"),
    Locator::Css("button.cal-next"),
];

/// One category tab: radio value and the label words next to it
#[derive(Debug, Clone, Copy)]
pub struct SiteTab {
    pub category: Category,
    pub radio_value: &'static str,
    pub keywords: &'static [&'static str],
}

pub const TABS: &[SiteTab] = &[
    SiteTab {
        category: Category::Caravan,
        radio_value: "G01",
        keywords: &["카라반"],
    },
    SiteTab {
        category: Category::Auto,
        radio_value: "G02",
        keywords: &["오토사이트", "오토"],
    },
    SiteTab {
        category: Category::General,
        radio_value: "G03",
        keywords: &["일반사이트", "일반"],
    },
];

const RADIO_CHECKED_SCRIPT: &str = r#"
const r = document.querySelector('input[type="radio"][value="' + arguments[0] + '"]');
return !!(r && r.checked);
"#;

const FORCE_CHECK_SCRIPT: &str = r#"
const el = arguments[0];
el.checked = true;
el.dispatchEvent(new Event('input', {bubbles: true}));
el.dispatchEvent(new Event('change', {bubbles: true}));
el.dispatchEvent(new Event('click', {bubbles: true}));
return true;
"#;

/// Page hooks that switch the site type, plus the hidden field they read
const GUBUN_HOOKS_SCRIPT: &str = r#"
const v = arguments[0];
try { if (typeof siteGubunChange === 'function') siteGubunChange(v); } catch (e) {}
try { if (typeof fnSiteGubun === 'function') fnSiteGubun(v); } catch (e) {}
try { if (typeof changeGubun === 'function') changeGubun(v); } catch (e) {}
try { if (typeof fnSearch === 'function') fnSearch(); } catch (e) {}
const hid = document.querySelector('input[name*="Gubun" i], input[id*="Gubun" i]');
if (hid) { hid.value = v; hid.dispatchEvent(new Event('change', {bubbles: true})); }
return true;
"#;

/// The list only renders once a party size is chosen; pick the first real option
const PICK_PERSON_SCRIPT: &str = r#"
const queries = ['select[name*="person" i]', 'select[id*="person" i]',
                 'select[name*="cnt" i]', 'select[id*="cnt" i]', 'select'];
for (const q of queries) {
  for (const s of document.querySelectorAll(q)) {
    const opt = Array.from(s.options).find(o => (o.value || '').trim());
    if (opt) {
      s.value = opt.value;
      s.dispatchEvent(new Event('input', {bubbles: true}));
      s.dispatchEvent(new Event('change', {bubbles: true}));
      return true;
    }
  }
}
return false;
"#;

const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView({block: 'center'}); return true;";

fn date_cell_selector(date: &str) -> String {
    format!("td.date-td[data-date-string=\"{date}\"]")
}

/// Sites of `tab` among scanned button signals
///
/// Bare numbers belong to the active tab; labels naming another category
/// are leftovers from the previous tab and are dropped.
pub fn collect_tab_sites(tab: &SiteTab, signals: &[ElementSignal], into: &mut AvailabilityResult) {
    for signal in signals {
        let Some(label) = parse_site_label(signal.label_text()) else {
            continue;
        };
        if label.category_or(tab.category) != tab.category {
            continue;
        }
        into.record(tab.category, label.site_id(), classify(signal));
    }
}

/// Browser flow for the yeongdo reservation page
#[derive(Debug, Clone, Copy, Default)]
pub struct YeongdoFlow;

impl YeongdoFlow {
    async fn open_date(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
    ) -> Result<(), AutomationError> {
        let cell = date_cell_selector(&ctx.date_string());

        let mut jumps = 0;
        while jumps < ctx.tuning.calendar_max_jumps {
            if !session.find_elements(Locator::Css(&cell)).await?.is_empty() {
                break;
            }
            ctx.ensure_time("yeongdo calendar")?;
            if !click_first(session, NEXT_MONTH).await?
                && call_first_function(session, &["goMonth"], vec![json!(1)])
                    .await?
                    .is_none()
            {
                call_first_function(session, &["nextMonth"], Vec::new()).await?;
            }
            pause(350).await;
            jumps += 1;
        }

        let cells = wait_for_elements(
            session,
            Locator::Css(&cell),
            ctx.bounded_wait(),
            "yeongdo date cell",
        )
        .await?;
        let anchors = session
            .find_elements(Locator::Css(&format!("{cell} a")))
            .await?;
        let target = anchors.first().unwrap_or(&cells[0]);

        run_script_soft(session, SCROLL_INTO_VIEW, vec![target.to_arg()]).await?;
        click(session, target).await?;
        pause(400).await;

        tracing::debug!(date = %ctx.key.date, jumps, "Calendar date selected");
        Ok(())
    }

    async fn tab_checked(&self, session: &BrowserSession, tab: &SiteTab) -> Result<bool, AutomationError> {
        let value = run_script_soft(session, RADIO_CHECKED_SCRIPT, vec![json!(tab.radio_value)]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn switch_tab(&self, session: &BrowserSession, tab: &SiteTab) -> Result<(), AutomationError> {
        if self.tab_checked(session, tab).await? {
            return Ok(());
        }

        let radio = format!("input[type=\"radio\"][value=\"{}\"]", tab.radio_value);
        if let Some(el) = session.find_elements(Locator::Css(&radio)).await?.first() {
            run_script_soft(session, SCROLL_INTO_VIEW, vec![el.to_arg()]).await?;
            if let Err(e) = click(session, el).await {
                tracing::debug!(tab = tab.radio_value, error = %e, "Radio click failed");
            }
            run_script_soft(session, FORCE_CHECK_SCRIPT, vec![el.to_arg()]).await?;
        }

        if !self.tab_checked(session, tab).await? {
            let labels: Vec<String> = tab
                .keywords
                .iter()
                .map(|kw| format!("//label[contains(normalize-space(.),\"{kw}\")]"))
                .collect();
            let locators: Vec<Locator<'_>> = labels.iter().map(|x| Locator::XPath(x.as_str())).collect();
            click_first(session, &locators).await?;
        }

        if !self.tab_checked(session, tab).await? {
            run_script_soft(session, GUBUN_HOOKS_SCRIPT, vec![json!(tab.radio_value)]).await?;
        }

        match wait_until(
            session,
            RADIO_CHECKED_SCRIPT,
            vec![json!(tab.radio_value)],
            Duration::from_secs(8),
            "yeongdo tab switch",
        )
        .await
        {
            Ok(()) => Ok(()),
            Err(AutomationError::Timeout(_)) => {
                // Some layouts never check the radio; the list may still refresh
                tracing::debug!(tab = tab.radio_value, "Tab radio never reported checked");
                pause(500).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn scan_tab(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
    ) -> Result<Vec<ElementSignal>, AutomationError> {
        for attempt in 0..ctx.tuning.tab_scan_attempts {
            let signals = scan_signals(session, SITE_BUTTONS).await?;
            if !signals.is_empty() {
                return Ok(signals);
            }
            tracing::trace!(attempt, "No site buttons yet");
            tokio::time::sleep(ctx.tuning.tab_scan_backoff).await;
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl BrowserFlow for YeongdoFlow {
    fn name(&self) -> &'static str {
        "yeongdo"
    }

    async fn run(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
    ) -> Result<AvailabilityResult, AutomationError> {
        session.navigate(&ctx.page_url).await?;
        dismiss_alert(session).await?;

        self.open_date(session, ctx).await?;

        let mut result = AvailabilityResult::skeleton(CATEGORIES.iter().copied());
        for tab in TABS {
            if ctx.ensure_time("yeongdo tabs").is_err() {
                tracing::warn!(
                    date = %ctx.key.date,
                    category = tab.category.as_str(),
                    "Flow budget spent, returning partial result"
                );
                break;
            }

            self.switch_tab(session, tab).await?;
            pause(300).await;
            let picked: Value = run_script_soft(session, PICK_PERSON_SCRIPT, Vec::new()).await?;
            pause(300).await;

            let signals = self.scan_tab(session, ctx).await?;
            tracing::debug!(
                category = tab.category.as_str(),
                buttons = signals.len(),
                person_picked = picked.as_bool().unwrap_or(false),
                "Scanned tab"
            );
            collect_tab_sites(tab, &signals, &mut result);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SiteId, SiteStatus};

    fn button(text: &str, title: &str, disabled: bool) -> ElementSignal {
        ElementSignal {
            text: text.into(),
            title: title.into(),
            disabled,
            classes: vec!["b1".into()],
            ..ElementSignal::default()
        }
    }

    #[test]
    fn test_collect_attributes_bare_numbers_to_active_tab() {
        let tab = &TABS[1];
        let signals = vec![
            button("오토 3", "예약가능", false),
            button("7", "예약불가", false),
            button("12", "", true),
            button("카라반 1", "예약가능", false),
            button("1 2", "예약가능", false),
        ];
        let mut result = AvailabilityResult::skeleton(CATEGORIES.iter().copied());
        collect_tab_sites(tab, &signals, &mut result);

        assert_eq!(
            result.status_of(Category::Auto, &SiteId::new("3")),
            Some(SiteStatus::Available)
        );
        assert_eq!(
            result.status_of(Category::Auto, &SiteId::new("7")),
            Some(SiteStatus::Unavailable)
        );
        assert_eq!(
            result.status_of(Category::Auto, &SiteId::new("12")),
            Some(SiteStatus::Unavailable)
        );
        assert!(result.category(Category::Caravan).unwrap().is_empty());
        assert_eq!(result.site_count(), 3);
    }

    #[test]
    fn test_date_cell_selector() {
        assert_eq!(
            date_cell_selector("2025-07-04"),
            "td.date-td[data-date-string=\"2025-07-04\"]"
        );
    }

    #[test]
    fn test_tabs_cover_categories() {
        let tabs: Vec<Category> = TABS.iter().map(|t| t.category).collect();
        assert_eq!(tabs, CATEGORIES);
    }
}
