//! HTML parsing and availability extraction
//!
//! Turns reservation markup into [`ElementSignal`]s, classifies them and
//! files the sites into an [`AvailabilityResult`]. Page-specific layouts
//! implement [`PageParser`] so the GET and POST tiers can share them.

pub mod classify;
pub mod label;
pub mod selectors;

pub use classify::{classify, ElementSignal};
pub use label::{category_for_synonym, parse_site_label, SiteLabel};

use scraper::{ElementRef, Html, Selector};

use crate::models::{AvailabilityResult, Category};
use crate::utils::normalize_whitespace;
use selectors::SiteButtonSelectors;

/// Markup to availability, for one page layout
pub trait PageParser: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Extract availability; unrecognized markup yields an empty result
    fn parse(&self, html: &str) -> AvailabilityResult;
}

/// Read the status-bearing attributes of an element
pub fn element_signal(el: ElementRef<'_>, image: &Selector) -> ElementSignal {
    let value = el.value();
    let attr = |name: &str| value.attr(name).unwrap_or("").trim().to_string();

    let aria_disabled = value
        .attr("aria-disabled")
        .map(str::trim)
        .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

    ElementSignal {
        title: attr("title"),
        aria_label: attr("aria-label"),
        text: normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")),
        classes: value.classes().map(str::to_string).collect(),
        disabled: value.attr("disabled").is_some(),
        aria_disabled,
        image_alt: el
            .select(image)
            .next()
            .and_then(|img| img.value().attr("alt"))
            .map(str::to_string),
    }
}

/// Parser for pages that render one button or link per site,
/// labelled `<category> <number>`
#[derive(Debug, Clone)]
pub struct SiteButtonParser {
    categories: Vec<Category>,
}

impl SiteButtonParser {
    pub fn new(categories: impl Into<Vec<Category>>) -> Self {
        Self {
            categories: categories.into(),
        }
    }
}

impl PageParser for SiteButtonParser {
    fn name(&self) -> &'static str {
        "site-buttons"
    }

    fn parse(&self, html: &str) -> AvailabilityResult {
        let document = Html::parse_document(html);
        let selectors = SiteButtonSelectors::new();

        let mut nodes: Vec<ElementRef<'_>> = document.select(selectors.titled).collect();
        if nodes.is_empty() {
            nodes = document.select(selectors.any).collect();
        }

        let mut result = AvailabilityResult::skeleton(self.categories.iter().copied());
        for node in nodes {
            let signal = element_signal(node, selectors.image);
            let Some(label) =
                parse_site_label(signal.label_text()).or_else(|| parse_site_label(&signal.title))
            else {
                continue;
            };
            // Static markup has no active tab to attribute a bare number to
            let Some(category) = label.category else {
                continue;
            };
            if !self.categories.contains(&category) {
                continue;
            }
            result.record(category, label.site_id(), classify(&signal));
        }

        tracing::debug!(
            parser = self.name(),
            sites = result.site_count(),
            "Parsed site buttons"
        );
        result
    }
}
