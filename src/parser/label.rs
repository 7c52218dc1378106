//! Site label extraction
//!
//! Interactive pages label each site button with a category word and a
//! number ("카라반 05", "오토사이트12"). Labels are normalized first (status
//! words and brackets dropped, whitespace collapsed) and must then be exactly
//! `<category><1-3 digits>`; anything else, including labels carrying two
//! numbers, is discarded. A bare number yields a label without category.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{Category, SiteId};
use crate::utils::normalize_whitespace;

/// Category words seen on the pages, longest alternatives first
pub const CATEGORY_SYNONYMS: &[(&str, Category)] = &[
    ("오토사이트", Category::Auto),
    ("일반사이트", Category::General),
    ("오토캠핑", Category::Auto),
    ("일반캠핑", Category::General),
    ("카라반", Category::Caravan),
    ("caravan", Category::Caravan),
    ("general", Category::General),
    ("오토", Category::Auto),
    ("일반", Category::General),
    ("auto", Category::Auto),
    ("데크", Category::Deck),
    ("deck", Category::Deck),
];

/// Status phrases that decorate labels; removed before matching
const LABEL_NOISE: &[&str] = &[
    "예약가능",
    "예약불가",
    "예약완료",
    "불가능",
    "마감",
    "불가",
    "가능",
    "선택",
];

lazy_static! {
    static ref CATEGORY_LABEL: Regex = {
        let names: Vec<&str> = CATEGORY_SYNONYMS.iter().map(|(name, _)| *name).collect();
        let pattern = format!(r"(?i)^({})\s*([0-9]{{1,3}})\s*번?$", names.join("|"));
        Regex::new(&pattern).expect("Invalid label pattern")
    };

    static ref BARE_NUMBER: Regex =
        Regex::new(r"^([0-9]{1,3})\s*번?$").expect("Invalid label pattern");

    static ref BRACKETS: Regex =
        Regex::new(r"[\(\)\[\]\{\}<>【】「」:·|]").expect("Invalid label pattern");
}

/// A parsed site label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteLabel {
    /// `None` when the label was a bare number
    pub category: Option<Category>,
    pub number: u32,
}

impl SiteLabel {
    pub fn site_id(&self) -> SiteId {
        SiteId::from_number(self.number)
    }

    /// Category of this label, or the active tab's when the label has none
    pub fn category_or(&self, active: Category) -> Category {
        self.category.unwrap_or(active)
    }
}

/// Map a category word to its canonical category
pub fn category_for_synonym(word: &str) -> Option<Category> {
    let word = word.trim().to_lowercase();
    CATEGORY_SYNONYMS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, category)| *category)
}

/// Normalize a raw label: drop status words and brackets, collapse spaces
pub fn normalize_label(raw: &str) -> String {
    let mut text = BRACKETS.replace_all(raw, " ").into_owned();
    for noise in LABEL_NOISE {
        text = text.replace(noise, " ");
    }
    normalize_whitespace(&text)
}

/// Parse a site label into category and number
pub fn parse_site_label(raw: &str) -> Option<SiteLabel> {
    let label = normalize_label(raw);
    if label.is_empty() {
        return None;
    }

    if let Some(caps) = CATEGORY_LABEL.captures(&label) {
        let category = category_for_synonym(caps.get(1)?.as_str())?;
        let number = caps.get(2)?.as_str().parse().ok()?;
        return Some(SiteLabel {
            category: Some(category),
            number,
        });
    }

    let caps = BARE_NUMBER.captures(&label)?;
    let number = caps.get(1)?.as_str().parse().ok()?;
    Some(SiteLabel {
        category: None,
        number,
    })
}
