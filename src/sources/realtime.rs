//! Real-time reservation boards (samnak, daejeo, hwamyeong)
//!
//! The board is server-rendered: one anchor per site, classed with its zone
//! (`area_a` … `area_d`) and a status class (`cbtn_on`, `cbtn_Pcomplete`),
//! with the site number in a hidden `input.sitename`.

use scraper::{ElementRef, Html};

use crate::models::{AvailabilityResult, Category, SiteId};
use crate::parser::selectors::{RealtimeSelectors, SiteButtonSelectors};
use crate::parser::{classify, element_signal, PageParser};

/// Zones of the samnak and daejeo boards
pub const STANDARD_AREAS: &[Category] = &[
    Category::AreaA,
    Category::AreaB,
    Category::AreaC,
    Category::AreaD,
];

/// Zones of the hwamyeong board, whose `area_d` anchors also carry zone E
pub const SPLIT_AREAS: &[Category] = &[
    Category::AreaA,
    Category::AreaB,
    Category::AreaC,
    Category::AreaD,
    Category::AreaE,
];

/// Parser for a real-time board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeBoardParser {
    split_area_d: bool,
}

impl RealtimeBoardParser {
    pub fn standard() -> Self {
        Self {
            split_area_d: false,
        }
    }

    /// `area_d` anchors are labelled `D<n>` / `E<n>` and split by prefix
    pub fn split_area_d() -> Self {
        Self { split_area_d: true }
    }

    pub fn categories(&self) -> &'static [Category] {
        if self.split_area_d {
            SPLIT_AREAS
        } else {
            STANDARD_AREAS
        }
    }

    fn sitename(anchor: ElementRef<'_>, selectors: &RealtimeSelectors) -> Option<String> {
        let value = anchor
            .select(selectors.sitename)
            .next()?
            .value()
            .attr("value")?
            .trim();
        // Numbered sites only; decorations share the zone class
        value.parse::<u32>().ok()?;
        Some(value.to_string())
    }

    fn split_label(anchor: ElementRef<'_>) -> Option<(Category, String)> {
        let label = anchor.text().map(str::trim).find(|t| !t.is_empty())?;
        let category = match label.chars().next()? {
            'D' => Category::AreaD,
            'E' => Category::AreaE,
            _ => return None,
        };
        Some((category, label.to_string()))
    }
}

impl PageParser for RealtimeBoardParser {
    fn name(&self) -> &'static str {
        if self.split_area_d {
            "realtime-board-split"
        } else {
            "realtime-board"
        }
    }

    fn parse(&self, html: &str) -> AvailabilityResult {
        let document = Html::parse_document(html);
        let selectors = RealtimeSelectors::new();
        let image = SiteButtonSelectors::new().image;

        let mut result = AvailabilityResult::skeleton(self.categories().iter().copied());

        for (letter, selector) in selectors.areas {
            if self.split_area_d && *letter == 'd' {
                for anchor in document.select(selector) {
                    let Some((category, label)) = Self::split_label(anchor) else {
                        continue;
                    };
                    let status = classify(&element_signal(anchor, image));
                    result.record(category, SiteId::new(label), status);
                }
                continue;
            }

            let Some(category) = Category::area(*letter) else {
                continue;
            };
            for anchor in document.select(selector) {
                let Some(name) = Self::sitename(anchor, &selectors) else {
                    continue;
                };
                let status = classify(&element_signal(anchor, image));
                result.record(category, SiteId::new(name), status);
            }
        }

        tracing::debug!(
            parser = self.name(),
            sites = result.site_count(),
            available = result.available_count(),
            "Parsed real-time board"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteStatus;

    const BOARD: &str = r##"
        <div class="board">
          <a class="cbtn area_a cbtn_on" href="#"><input type="hidden" class="sitename" value="1">1</a>
          <a class="cbtn area_a cbtn_Pcomplete" href="#"><input type="hidden" class="sitename" value="2">2</a>
          <a class="cbtn area_b cbtn_on" href="#"><input type="hidden" class="sitename" value="10"></a>
          <a class="cbtn area_c cbtn_Pcomplete" href="#"><input type="hidden" class="sitename" value="x"></a>
          <a class="cbtn area_d cbtn_on" href="#"><input type="hidden" class="sitename" value="31"></a>
        </div>"##;

    const HWAMYEONG: &str = r#"
        <div>
          <a class="cbtn area_a cbtn_on"><input class="sitename" value="3"></a>
          <a class="cbtn area_d cbtn_on">D3<input class="sitename" value="3"></a>
          <a class="cbtn area_d cbtn_Pcomplete">E12<input class="sitename" value="12"></a>
          <a class="cbtn area_d cbtn_on">X1</a>
        </div>"#;

    #[test]
    fn test_standard_board() {
        let result = RealtimeBoardParser::standard().parse(BOARD);
        assert_eq!(
            result.status_of(Category::AreaA, &SiteId::new("1")),
            Some(SiteStatus::Available)
        );
        assert_eq!(
            result.status_of(Category::AreaA, &SiteId::new("2")),
            Some(SiteStatus::Unavailable)
        );
        assert_eq!(
            result.status_of(Category::AreaB, &SiteId::new("10")),
            Some(SiteStatus::Available)
        );
        // Non-numeric sitename skipped, zone still listed
        assert!(result.category(Category::AreaC).unwrap().is_empty());
        assert_eq!(result.site_count(), 4);
        assert!(result.category(Category::AreaE).is_none());
    }

    #[test]
    fn test_split_area_d() {
        let result = RealtimeBoardParser::split_area_d().parse(HWAMYEONG);
        assert_eq!(
            result.status_of(Category::AreaD, &SiteId::new("D3")),
            Some(SiteStatus::Available)
        );
        assert_eq!(
            result.status_of(Category::AreaE, &SiteId::new("E12")),
            Some(SiteStatus::Unavailable)
        );
        assert_eq!(result.site_count(), 3);
        assert_eq!(result.categories().count(), 5);
    }

    #[test]
    fn test_unrelated_page_is_skeleton() {
        let result = RealtimeBoardParser::standard().parse("<html><body>점검중</body></html>");
        assert!(result.is_empty());
        assert_eq!(result.categories().count(), 4);
    }
}
