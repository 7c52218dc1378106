//! Property and table tests for the status classifier and label extraction

use campwatch::models::{Category, SiteStatus};
use campwatch::parser::{classify, element_signal, parse_site_label, ElementSignal};
use proptest::prelude::*;

fn signal(title: &str, text: &str, classes: &[&str]) -> ElementSignal {
    ElementSignal {
        title: title.to_string(),
        text: text.to_string(),
        classes: classes.iter().map(|c| c.to_string()).collect(),
        ..ElementSignal::default()
    }
}

#[test]
fn test_caravan_button_scenario() {
    let button = signal("카라반 05 예약가능", "카라반 05", &["b1"]);
    let label = parse_site_label(button.label_text()).unwrap();

    assert_eq!(label.category, Some(Category::Caravan));
    assert_eq!(label.number, 5);
    assert_eq!(classify(&button), SiteStatus::Available);
}

#[test]
fn test_rule_order() {
    // disabled wins over any marker
    let mut disabled = signal("예약가능", "", &["on"]);
    disabled.disabled = true;
    assert_eq!(classify(&disabled), SiteStatus::Unavailable);

    // negated marker is not an available marker
    assert_eq!(classify(&signal("예약불가", "", &[])), SiteStatus::Unavailable);
    assert_eq!(classify(&signal("", "unavailable", &[])), SiteStatus::Unavailable);

    // negative class tokens are checked first
    assert_eq!(classify(&signal("", "", &["btn-on", "sold-out"])), SiteStatus::Unavailable);
    assert_eq!(classify(&signal("", "", &["cbtn_on"])), SiteStatus::Available);

    // image alt
    let mut pictured = signal("", "", &[]);
    pictured.image_alt = Some("예약가능".into());
    assert_eq!(classify(&pictured), SiteStatus::Available);

    // nothing matched
    assert_eq!(classify(&signal("", "7", &[])), SiteStatus::Unavailable);
}

#[test]
fn test_negated_keywords_stay_unavailable() {
    let negated_classes: &[&[&str]] = &[
        &["btn_impossible"],
        &["seat-disable"],
        &["notavailable"],
        &["site", "unable"],
        &["b1", "disabled"],
    ];
    for classes in negated_classes {
        assert_eq!(
            classify(&signal("", "", classes)),
            SiteStatus::Unavailable,
            "{classes:?}"
        );
    }

    for alt in ["unavailable", "disabled seat", "not available", "impossible", "예약 불가능"] {
        let mut pictured = signal("", "카라반 05", &[]);
        pictured.image_alt = Some(alt.to_string());
        assert_eq!(classify(&pictured), SiteStatus::Unavailable, "{alt}");
    }

    // the plain words still count as available
    assert_eq!(classify(&signal("", "", &["cbtn_possible"])), SiteStatus::Available);
    let mut pictured = signal("", "카라반 05", &[]);
    pictured.image_alt = Some("available".to_string());
    assert_eq!(classify(&pictured), SiteStatus::Available);
}

#[test]
fn test_aria_disabled_any_case() {
    let html = r##"<div><button aria-disabled="TRUE" title="예약가능">카라반 05</button></div>"##;
    let document = scraper::Html::parse_fragment(html);
    let button = scraper::Selector::parse("button").unwrap();
    let image = scraper::Selector::parse("img").unwrap();
    let el = document.select(&button).next().unwrap();

    let signal = element_signal(el, &image);
    assert!(signal.aria_disabled);
    assert_eq!(classify(&signal), SiteStatus::Unavailable);
}

#[test]
fn test_labels() {
    assert_eq!(parse_site_label("오토사이트 12").unwrap().category, Some(Category::Auto));
    assert_eq!(parse_site_label("[데크] 3").unwrap().category, Some(Category::Deck));
    assert_eq!(parse_site_label("7").unwrap().category, None);
    assert!(parse_site_label("카라반 1 2").is_none());
    assert!(parse_site_label("글램핑 1").is_none());
    assert!(parse_site_label("카라반 1234").is_none());
}

fn arb_signal() -> impl Strategy<Value = ElementSignal> {
    let words = prop::sample::select(vec![
        "", "예약가능", "가능", "예약불가", "불가", "마감", "예약완료", "available",
        "unavailable", "sold out", "vacant", "카라반 05", "7",
    ]);
    let classes = prop::collection::vec(
        prop::sample::select(vec![
            "b1", "on", "off", "cbtn_on", "cbtn_Pcomplete", "gray", "green", "able", "seat",
        ]),
        0..4,
    );
    (
        words.clone(),
        words.clone(),
        words,
        classes,
        any::<bool>(),
        any::<bool>(),
        prop::option::of(prop::sample::select(vec!["가능", "불가", "green", "grey"])),
    )
        .prop_map(|(title, aria, text, classes, disabled, aria_disabled, alt)| ElementSignal {
            title: title.to_string(),
            aria_label: aria.to_string(),
            text: text.to_string(),
            classes: classes.into_iter().map(str::to_string).collect(),
            disabled,
            aria_disabled,
            image_alt: alt.map(str::to_string),
        })
}

proptest! {
    #[test]
    fn classify_is_deterministic(signal in arb_signal()) {
        let first = classify(&signal);
        let copy = signal.clone();
        prop_assert_eq!(first, classify(&copy));
        prop_assert_eq!(first, classify(&signal));
    }

    #[test]
    fn disabled_is_always_unavailable(mut signal in arb_signal()) {
        signal.disabled = true;
        prop_assert_eq!(classify(&signal), SiteStatus::Unavailable);
    }

    #[test]
    fn label_numbers_round_to_site_ids(n in 0u32..1000) {
        let label = parse_site_label(&format!("카라반 {n}")).unwrap();
        prop_assert_eq!(label.number, n);
        prop_assert_eq!(label.category, Some(Category::Caravan));
    }
}
