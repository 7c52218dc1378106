//! Busan port healing campground, booked through the Interpark ticketing site
//!
//! The port's page hands off to Interpark, which may put the browser in a
//! queue before the booking page. Seats are grouped in blocks (deck, auto)
//! and labelled `<Letter>-<number>`.

use async_trait::async_trait;
use chrono::Datelike;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeSet;
use tokio::time::Instant;

use crate::crawler::interact::{
    call_first_function, click, click_first, dismiss_alert, pause, run_script_soft,
    scan_signals, BrowserFlow, FlowContext,
};
use crate::crawler::webdriver::{BrowserSession, Locator};
use crate::models::{AvailabilityResult, Category, SiteId};
use crate::parser::{classify, ElementSignal};
use crate::utils::error::AutomationError;

pub const CATEGORIES: &[Category] = &[Category::Auto, Category::Deck];

/// Interpark booking entry, used when the port page hook does not redirect
pub const BOOK_MAIN_URL: &str = "https://ticket.interpark.com/PCampingBook/BookMain.asp";

const BOOK_MAIN_MARKER: &str = "PCampingBook/BookMain.asp";

/// Seat blocks by region code
pub const BLOCKS: &[(&str, Category)] = &[("RGN001", Category::Deck), ("RGN002", Category::Auto)];

const PERIOD_TEXT: &str = "1박 2일";

const SEAT_SELECTOR: &str = "[title], [aria-label], a, button, .seat, .unit, .block a";

const NEXT_MONTH: &[Locator<'static>] = &[
    Locator::Css("a[title*='다음']"),
    Locator::Css("button[title*='다음']"),
    Locator::Css(".ui-datepicker-next"),
    Locator::Css(".month-next"),
    Locator::Css(".btn.next"),
    Locator::Css("a.next"),
    Locator::Css("button.next"),
    Locator::Css(".cal-next"),
];

/// Returns `month` when the calendar shows another month, `day` when the
/// day cell is missing, `picked` after clicking it
const PICK_DAY_SCRIPT: &str = r#"
const [y, m, d, target] = arguments;
const head = Array.from(document.querySelectorAll('.cal, .calendar, .date, .month, .ui-datepicker-title, .dateTit, .date_top'))
  .map(e => (e.innerText || '').trim()).join(' ');
const mm = String(m).padStart(2, '0');
if (!(head.includes(String(y)) && (head.includes(m + '월') || head.includes(mm)))) return 'month';
let cells = Array.from(document.querySelectorAll('[data-date="' + target + '"], [data-day="' + d + '"]'));
if (!cells.length) {
  cells = Array.from(document.querySelectorAll('td a, td, .cal a, .calendar a'))
    .filter(el => (el.innerText || '').trim() === String(d));
}
if (!cells.length) return 'day';
cells[0].scrollIntoView({block: 'center'});
cells[0].click();
return 'picked';
"#;

const SELECT_PERIOD_SCRIPT: &str = r#"
const text = arguments[0];
for (const s of document.querySelectorAll('select')) {
  const o = Array.from(s.options).find(o => (o.text || '').trim() === text);
  if (o) {
    s.value = o.value;
    s.dispatchEvent(new Event('change', {bubbles: true}));
    return true;
  }
}
return false;
"#;

lazy_static! {
    static ref SEAT_ID: Regex = Regex::new(r"\b([A-Z])-(\d{1,3})\b").expect("Invalid seat pattern");
}

/// Seat identifier carried by a signal's title, aria-label or text
///
/// Elements naming zero or several distinct seats are containers, not seats.
pub fn seat_id(signal: &ElementSignal) -> Option<SiteId> {
    let label = [&signal.title, &signal.aria_label, &signal.text]
        .into_iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())?;

    let ids: BTreeSet<String> = SEAT_ID
        .captures_iter(label)
        .map(|caps| format!("{}-{}", &caps[1], &caps[2]))
        .collect();

    match ids.len() {
        1 => ids.into_iter().next().map(SiteId::new),
        _ => None,
    }
}

/// Record every seat among `signals` under `category`
pub fn collect_seats(category: Category, signals: &[ElementSignal], into: &mut AvailabilityResult) {
    for signal in signals {
        if let Some(site) = seat_id(signal) {
            into.record(category, site, classify(signal));
        }
    }
}

fn is_login_prompt(text: &str) -> bool {
    text.contains("로그인") || text.to_lowercase().contains("login")
}

/// Browser flow for the Interpark camping booking page
#[derive(Debug, Clone, Copy, Default)]
pub struct InterparkFlow;

impl InterparkFlow {
    async fn fail_on_login_alert(&self, session: &BrowserSession) -> Result<(), AutomationError> {
        if let Some(text) = dismiss_alert(session).await? {
            if is_login_prompt(&text) {
                return Err(AutomationError::LoginRequired(text));
            }
            tracing::debug!(alert = %text, "Dismissed alert");
        }
        Ok(())
    }

    async fn enter_booking(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
    ) -> Result<(), AutomationError> {
        session.navigate(&ctx.page_url).await?;
        self.fail_on_login_alert(session).await?;

        call_first_function(session, &["fnTicketBooking"], Vec::new()).await?;
        pause(500).await;
        self.fail_on_login_alert(session).await?;

        if !session.current_url().await?.contains(BOOK_MAIN_MARKER) {
            session.navigate(BOOK_MAIN_URL).await?;
            self.fail_on_login_alert(session).await?;
        }

        // Queue pages redirect on their own
        let deadline = Instant::now() + ctx.tuning.queue_wait;
        loop {
            if session.current_url().await?.contains(BOOK_MAIN_MARKER) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout("interpark queue".into()));
            }
            pause(600).await;
        }
    }

    async fn pick_date(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
    ) -> Result<(), AutomationError> {
        let date = ctx.key.date;
        let args = vec![
            json!(date.year()),
            json!(date.month()),
            json!(date.day()),
            json!(ctx.date_string()),
        ];

        for _ in 0..ctx.tuning.calendar_max_jumps {
            ctx.ensure_time("interpark calendar")?;
            let state = run_script_soft(session, PICK_DAY_SCRIPT, args.clone()).await?;
            if state.as_str() == Some("picked") {
                pause(300).await;
                return Ok(());
            }

            if !click_first(session, NEXT_MONTH).await?
                && call_first_function(session, &["goMonth"], vec![json!(1)])
                    .await?
                    .is_none()
            {
                call_first_function(session, &["nextMonth"], Vec::new()).await?;
            }
            pause(350).await;
        }

        Err(AutomationError::ElementNotFound(format!(
            "interpark calendar cell {}",
            ctx.date_string()
        )))
    }

    async fn select_period(&self, session: &BrowserSession) -> Result<(), AutomationError> {
        let selected = run_script_soft(session, SELECT_PERIOD_SCRIPT, vec![json!(PERIOD_TEXT)]).await?;
        if selected.as_bool().unwrap_or(false) {
            pause(200).await;
            return Ok(());
        }

        // Custom dropdown
        let opened = click_first(
            session,
            &[Locator::XPath(
                "//*[contains(text(),'이용기간')]/following::button[1] | //button[contains(.,'이용기간')]",
            )],
        )
        .await?;
        if opened {
            pause(200).await;
        }
        let item = format!("//li[normalize-space()='{PERIOD_TEXT}'] | //a[normalize-space()='{PERIOD_TEXT}']");
        if click_first(session, &[Locator::XPath(&item)]).await? {
            pause(200).await;
        } else {
            tracing::warn!("Stay period control not found, keeping the page default");
        }
        Ok(())
    }

    async fn open_block(&self, session: &BrowserSession, code: &str) -> Result<bool, AutomationError> {
        let xpath = format!(
            "//*[contains(@onclick, \"GetBlockSeatList\") and contains(@onclick, \"'{code}'\")]"
        );
        match session.find_elements(Locator::XPath(&xpath)).await?.first() {
            Some(block) => {
                click(session, block).await?;
                pause(700).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl BrowserFlow for InterparkFlow {
    fn name(&self) -> &'static str {
        "interpark"
    }

    async fn run(
        &self,
        session: &BrowserSession,
        ctx: &FlowContext,
    ) -> Result<AvailabilityResult, AutomationError> {
        self.enter_booking(session, ctx).await?;

        call_first_function(session, &["fnBookNoticeShowHide"], vec![json!("")]).await?;
        pause(200).await;

        self.pick_date(session, ctx).await?;
        self.select_period(session).await?;

        let mut result = AvailabilityResult::skeleton(CATEGORIES.iter().copied());
        for (code, category) in BLOCKS {
            ctx.ensure_time("interpark blocks")?;
            if !self.open_block(session, code).await? {
                tracing::warn!(block = code, "Seat block not found");
                continue;
            }
            let signals = scan_signals(session, SEAT_SELECTOR).await?;
            let before = result.site_count();
            collect_seats(*category, &signals, &mut result);
            tracing::debug!(
                block = code,
                category = category.as_str(),
                seats = result.site_count() - before,
                "Scanned seat block"
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteStatus;

    fn seat(title: &str, classes: &[&str]) -> ElementSignal {
        ElementSignal {
            title: title.into(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ..ElementSignal::default()
        }
    }

    #[test]
    fn test_seat_id() {
        assert_eq!(seat_id(&seat("[데크사이트] B-21", &[])), Some(SiteId::new("B-21")));
        assert_eq!(seat_id(&seat("A-3 예약가능", &[])), Some(SiteId::new("A-3")));
        assert_eq!(seat_id(&seat("A-3 A-4", &[])), None);
        assert_eq!(seat_id(&seat("B-1234", &[])), None);
        assert_eq!(seat_id(&seat("데크", &[])), None);
    }

    #[test]
    fn test_collect_seats() {
        let signals = vec![
            seat("[데크사이트] B-21", &["seat", "on"]),
            seat("[데크사이트] B-3", &["seat", "seat_off"]),
            seat("블록 전체 B-1 B-2", &["block"]),
        ];
        let mut result = AvailabilityResult::skeleton(CATEGORIES.iter().copied());
        collect_seats(Category::Deck, &signals, &mut result);

        assert_eq!(
            result.status_of(Category::Deck, &SiteId::new("B-21")),
            Some(SiteStatus::Available)
        );
        assert_eq!(
            result.status_of(Category::Deck, &SiteId::new("B-3")),
            Some(SiteStatus::Unavailable)
        );
        assert_eq!(result.site_count(), 2);
    }

    #[test]
    fn test_login_prompt() {
        assert!(is_login_prompt("먼저 로그인 하세요."));
        assert!(!is_login_prompt("예약 가능한 날짜가 아닙니다"));
    }
}
