//! Availability classification from element signals
//!
//! Reservation pages encode status in whatever they have at hand: a
//! `disabled` attribute, tooltip text, a colour class, or the alt text of
//! an icon. [`classify`] reads an [`ElementSignal`] and applies the rules
//! below in order; the first rule that matches decides.
//!
//! 1. `disabled` or `aria-disabled` set → unavailable
//! 2. title/aria-label/text contains an available marker (not negated) →
//!    available; otherwise an unavailable marker → unavailable
//! 3. class tokens: negative keywords, then positive keywords; a positive
//!    keyword inside a negated word ("impossible", "disable") is negative
//! 4. child image alt: negative, then positive, with the same negation rule
//! 5. nothing matched → unavailable
//!
//! The function is pure; the same signal always yields the same status.

use serde::Deserialize;

use crate::models::SiteStatus;
use crate::utils::strip_whitespace;

/// Phrases meaning "can be booked"
const AVAILABLE_MARKERS: &[&str] = &["예약가능", "가능", "available", "vacant"];

/// A positive marker right after one of these is a negation ("불가능", "unavailable")
const NEGATION_PREFIXES: &[&str] = &["불", "un", "not"];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "예약불가",
    "불가",
    "마감",
    "예약완료",
    "unavailable",
    "soldout",
];

const NEGATIVE_CLASS_KEYWORDS: &[&str] = &[
    "off", "sold", "complete", "gray", "grey", "unavail", "notavail", "unable", "disable",
    "impossible",
];

const POSITIVE_CLASS_KEYWORDS: &[&str] = &["on", "able", "green", "possible", "avail"];

const NEGATIVE_ALT_KEYWORDS: &[&str] = &[
    "불가", "마감", "sold", "gray", "grey", "unavail", "notavail", "disab", "impossible",
];

const POSITIVE_ALT_KEYWORDS: &[&str] = &["가능", "green", "able"];

/// Word starts that turn a class part or alt word into its opposite
const NEGATED_WORD_PREFIXES: &[&str] = &["불", "un", "not", "non", "im", "in", "dis"];

/// Everything about one rendered site element that can carry status
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ElementSignal {
    pub title: String,
    #[serde(rename = "aria")]
    pub aria_label: String,
    pub text: String,
    pub classes: Vec<String>,
    pub disabled: bool,
    #[serde(rename = "ariaDisabled")]
    pub aria_disabled: bool,
    #[serde(rename = "imgAlt")]
    pub image_alt: Option<String>,
}

impl ElementSignal {
    /// Text used to find the site label: visible text, then aria-label, then title
    pub fn label_text(&self) -> &str {
        [&self.text, &self.aria_label, &self.title]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

/// Decide whether a site element is bookable
pub fn classify(signal: &ElementSignal) -> SiteStatus {
    if signal.disabled || signal.aria_disabled {
        return SiteStatus::Unavailable;
    }

    if let Some(status) = classify_text(signal) {
        return status;
    }

    if let Some(status) = classify_classes(&signal.classes) {
        return status;
    }

    if let Some(status) = signal.image_alt.as_deref().and_then(classify_alt) {
        return status;
    }

    SiteStatus::Unavailable
}

fn classify_text(signal: &ElementSignal) -> Option<SiteStatus> {
    let blob = strip_whitespace(&format!(
        "{}{}{}",
        signal.title, signal.aria_label, signal.text
    ))
    .to_lowercase();

    if blob.is_empty() {
        return None;
    }

    if AVAILABLE_MARKERS.iter().any(|m| has_unnegated(&blob, m)) {
        return Some(SiteStatus::Available);
    }

    if UNAVAILABLE_MARKERS.iter().any(|m| blob.contains(m)) {
        return Some(SiteStatus::Unavailable);
    }

    None
}

/// True when `marker` occurs somewhere not directly preceded by a negation
fn has_unnegated(blob: &str, marker: &str) -> bool {
    blob.match_indices(marker).any(|(idx, _)| {
        let before = &blob[..idx];
        !NEGATION_PREFIXES.iter().any(|neg| before.ends_with(neg))
    })
}

fn classify_classes(classes: &[String]) -> Option<SiteStatus> {
    let parts: Vec<String> = classes
        .iter()
        .flat_map(|c| c.split(['-', '_', ' ']))
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
        .collect();

    if parts.is_empty() {
        return None;
    }

    if NEGATIVE_CLASS_KEYWORDS
        .iter()
        .any(|kw| parts.iter().any(|p| class_part_matches(p, kw)))
    {
        return Some(SiteStatus::Unavailable);
    }

    let mut positive = false;
    for part in &parts {
        if POSITIVE_CLASS_KEYWORDS.iter().any(|kw| class_part_matches(part, kw)) {
            if is_negated_word(part) {
                return Some(SiteStatus::Unavailable);
            }
            positive = true;
        }
    }

    positive.then_some(SiteStatus::Available)
}

fn is_negated_word(word: &str) -> bool {
    NEGATED_WORD_PREFIXES.iter().any(|neg| word.starts_with(neg))
}

/// Short keywords must be the whole part ("on" is not "button");
/// longer ones may prefix or suffix it ("cbtn_pcomplete", "soldout").
fn class_part_matches(part: &str, keyword: &str) -> bool {
    if keyword.len() <= 3 {
        part == keyword
    } else {
        part.starts_with(keyword) || part.ends_with(keyword)
    }
}

fn classify_alt(alt: &str) -> Option<SiteStatus> {
    let alt = strip_whitespace(alt).to_lowercase();
    if alt.is_empty() {
        return None;
    }
    if NEGATIVE_ALT_KEYWORDS.iter().any(|kw| alt.contains(kw)) {
        return Some(SiteStatus::Unavailable);
    }
    let mut positive = false;
    for kw in POSITIVE_ALT_KEYWORDS {
        for (idx, _) in alt.match_indices(kw) {
            if NEGATED_WORD_PREFIXES.iter().any(|neg| alt[..idx].ends_with(neg)) {
                return Some(SiteStatus::Unavailable);
            }
            positive = true;
        }
    }
    positive.then_some(SiteStatus::Available)
}
