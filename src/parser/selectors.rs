//! CSS selectors for the reservation page layouts
//!
//! Compiled once on first use. Grouped per page shape: clickable site
//! buttons, replayable forms, and the real-time zone boards.

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    // Site buttons that carry a tooltip are the most reliable signal
    static ref BUTTONS_TITLED: Selector =
        parse_selector!("button[title], a[title], [role='button'][title]");

    static ref BUTTONS_ANY: Selector = parse_selector!("button, a, [role='button']");

    static ref IMAGE_WITH_ALT: Selector = parse_selector!("img[alt]");

    // Forms
    static ref FORM: Selector = parse_selector!("form");

    static ref FORM_FIELDS: Selector =
        parse_selector!("input[name], select[name], textarea[name]");

    static ref DATE_INPUT: Selector = parse_selector!("input[type='date'][name]");

    static ref OPTION: Selector = parse_selector!("option");

    static ref OPTION_SELECTED: Selector = parse_selector!("option[selected]");

    // Real-time zone boards
    static ref SITENAME_INPUT: Selector = parse_selector!("input.sitename");

    static ref AREA_ANCHORS: Vec<(char, Selector)> = vec![
        ('a', parse_selector!("a.area_a")),
        ('b', parse_selector!("a.area_b")),
        ('c', parse_selector!("a.area_c")),
        ('d', parse_selector!("a.area_d")),
    ];
}

/// Selectors for clickable site buttons
pub struct SiteButtonSelectors {
    /// Buttons/links with a `title` attribute
    pub titled: &'static Selector,
    /// Any button-like element, used when nothing carries a title
    pub any: &'static Selector,
    /// Child images whose alt text may carry status
    pub image: &'static Selector,
}

impl SiteButtonSelectors {
    pub fn new() -> Self {
        Self {
            titled: &BUTTONS_TITLED,
            any: &BUTTONS_ANY,
            image: &IMAGE_WITH_ALT,
        }
    }
}

impl Default for SiteButtonSelectors {
    fn default() -> Self {
        Self::new()
    }
}

/// Selectors for form discovery and replay
pub struct FormSelectors {
    pub form: &'static Selector,
    pub fields: &'static Selector,
    pub date_input: &'static Selector,
    pub option: &'static Selector,
    pub option_selected: &'static Selector,
}

impl FormSelectors {
    pub fn new() -> Self {
        Self {
            form: &FORM,
            fields: &FORM_FIELDS,
            date_input: &DATE_INPUT,
            option: &OPTION,
            option_selected: &OPTION_SELECTED,
        }
    }
}

impl Default for FormSelectors {
    fn default() -> Self {
        Self::new()
    }
}

/// Selectors for the real-time reservation boards
pub struct RealtimeSelectors {
    /// Zone letter with the anchor selector for that zone
    pub areas: &'static [(char, Selector)],
    /// Hidden input carrying the site name inside each anchor
    pub sitename: &'static Selector,
}

impl RealtimeSelectors {
    pub fn new() -> Self {
        Self {
            areas: &AREA_ANCHORS,
            sitename: &SITENAME_INPUT,
        }
    }
}

impl Default for RealtimeSelectors {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_selectors_compile() {
        let buttons = SiteButtonSelectors::new();
        let forms = FormSelectors::new();
        let boards = RealtimeSelectors::new();
        assert_eq!(boards.areas.len(), 4);

        let html = Html::parse_fragment(
            r#"<form><input name="a"><button title="x">1</button></form>"#,
        );
        assert_eq!(html.select(buttons.titled).count(), 1);
        assert_eq!(html.select(forms.form).count(), 1);
        assert_eq!(html.select(forms.fields).count(), 1);
    }
}
