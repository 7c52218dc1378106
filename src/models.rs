// Core data structures for campwatch

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Campground reservation sites we know how to scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Samnak,
    Daejeo,
    Hwamyeong,
    Yeongdo,
    BusanPort,
    Gudeok,
}

impl SourceId {
    /// Every source, in display order
    pub const ALL: [SourceId; 6] = [
        Self::Samnak,
        Self::Daejeo,
        Self::Hwamyeong,
        Self::Yeongdo,
        Self::BusanPort,
        Self::Gudeok,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Samnak => "samnak",
            Self::Daejeo => "daejeo",
            Self::Hwamyeong => "hwamyeong",
            Self::Yeongdo => "yeongdo",
            Self::BusanPort => "busan_port",
            Self::Gudeok => "gudeok",
        }
    }

    /// Korean display name
    pub fn korean_name(&self) -> &'static str {
        match self {
            Self::Samnak => "삼락",
            Self::Daejeo => "대저",
            Self::Hwamyeong => "화명",
            Self::Yeongdo => "영도",
            Self::BusanPort => "부산항",
            Self::Gudeok => "구덕",
        }
    }

    /// Parse from an id (`busan_port`, `busan-port`) or the Korean name
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == needle || id.korean_name() == s.trim())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown source: {s}"))
    }
}

/// The single index for cached results and in-flight jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub source: SourceId,
    pub date: NaiveDate,
}

impl QueryKey {
    pub fn new(source: SourceId, date: NaiveDate) -> Self {
        Self { source, date }
    }

    /// ISO `YYYY-MM-DD` rendering of the date
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source, self.date_string())
    }
}

/// Site category (tab, zone or block on the reservation page)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Caravan,
    Auto,
    General,
    Deck,
    AreaA,
    AreaB,
    AreaC,
    AreaD,
    AreaE,
}

impl Category {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Caravan => "caravan",
            Self::Auto => "auto",
            Self::General => "general",
            Self::Deck => "deck",
            Self::AreaA => "area_a",
            Self::AreaB => "area_b",
            Self::AreaC => "area_c",
            Self::AreaD => "area_d",
            Self::AreaE => "area_e",
        }
    }

    /// Korean display name
    pub fn korean_name(&self) -> &'static str {
        match self {
            Self::Caravan => "카라반",
            Self::Auto => "오토캠핑",
            Self::General => "일반캠핑",
            Self::Deck => "데크",
            Self::AreaA => "A구역",
            Self::AreaB => "B구역",
            Self::AreaC => "C구역",
            Self::AreaD => "D구역",
            Self::AreaE => "E구역",
        }
    }

    /// Zone categories used by the real-time reservation boards
    pub fn area(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'a' => Some(Self::AreaA),
            'b' => Some(Self::AreaB),
            'c' => Some(Self::AreaC),
            'd' => Some(Self::AreaD),
            'e' => Some(Self::AreaE),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a site can be booked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Available,
    Unavailable,
}

/// Site identifier as shown on the reservation page ("05", "D3", "B-21")
///
/// Ordered naturally: digit runs compare by value, so `2 < 10` and
/// `B-2 < B-10`. Ties between `05` and `5` fall back to the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    /// Identifier for a bare site number
    pub fn from_number(number: u32) -> Self {
        Self(number.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value when the identifier is all digits
    pub fn number(&self) -> Option<u32> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.0.parse().ok()
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for SiteId {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

impl PartialOrd for SiteId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn chunks(s: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut digit_run = None;
    for (idx, ch) in s.char_indices() {
        let is_digit = ch.is_ascii_digit();
        match digit_run {
            Some(prev) if prev != is_digit => {
                out.push((prev, &s[start..idx]));
                start = idx;
            }
            _ => {}
        }
        digit_run = Some(is_digit);
    }
    if let Some(prev) = digit_run {
        out.push((prev, &s[start..]));
    }
    out
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (left, right) = (chunks(a), chunks(b));
    for (x, y) in left.iter().zip(right.iter()) {
        let ord = match (x.0, y.0) {
            (true, true) => cmp_digits(x.1, y.1),
            _ => x.1.cmp(y.1),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

/// Available and unavailable sites of one category
///
/// An identifier lives in at most one bucket; recording a status moves it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteBuckets {
    available: BTreeSet<SiteId>,
    unavailable: BTreeSet<SiteId>,
}

impl SiteBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status, removing the site from the opposite bucket
    pub fn insert(&mut self, site: SiteId, status: SiteStatus) {
        match status {
            SiteStatus::Available => {
                self.unavailable.remove(&site);
                self.available.insert(site);
            }
            SiteStatus::Unavailable => {
                self.available.remove(&site);
                self.unavailable.insert(site);
            }
        }
    }

    pub fn available(&self) -> &BTreeSet<SiteId> {
        &self.available
    }

    pub fn unavailable(&self) -> &BTreeSet<SiteId> {
        &self.unavailable
    }

    pub fn status_of(&self, site: &SiteId) -> Option<SiteStatus> {
        if self.available.contains(site) {
            Some(SiteStatus::Available)
        } else if self.unavailable.contains(site) {
            Some(SiteStatus::Unavailable)
        } else {
            None
        }
    }

    /// Total number of sites seen
    pub fn len(&self) -> usize {
        self.available.len() + self.unavailable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty() && self.unavailable.is_empty()
    }

    /// Every site with its status
    pub fn iter(&self) -> impl Iterator<Item = (&SiteId, SiteStatus)> {
        self.available
            .iter()
            .map(|s| (s, SiteStatus::Available))
            .chain(self.unavailable.iter().map(|s| (s, SiteStatus::Unavailable)))
    }
}

/// Availability of one source on one date, per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AvailabilityResult {
    categories: BTreeMap<Category, SiteBuckets>,
}

impl AvailabilityResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every category present, both buckets empty
    pub fn skeleton(categories: impl IntoIterator<Item = Category>) -> Self {
        let categories = categories
            .into_iter()
            .map(|c| (c, SiteBuckets::new()))
            .collect();
        Self { categories }
    }

    /// Record a site's status (later records win)
    pub fn record(&mut self, category: Category, site: SiteId, status: SiteStatus) {
        self.categories.entry(category).or_default().insert(site, status);
    }

    /// Make sure a category shows up even when it has no sites
    pub fn ensure_category(&mut self, category: Category) {
        self.categories.entry(category).or_default();
    }

    /// Union `later` into `self`; on conflict the later result wins
    pub fn merge_from(&mut self, later: &AvailabilityResult) {
        for (category, buckets) in &later.categories {
            let target = self.categories.entry(*category).or_default();
            for (site, status) in buckets.iter() {
                target.insert(site.clone(), status);
            }
        }
    }

    pub fn category(&self, category: Category) -> Option<&SiteBuckets> {
        self.categories.get(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&Category, &SiteBuckets)> {
        self.categories.iter()
    }

    pub fn status_of(&self, category: Category, site: &SiteId) -> Option<SiteStatus> {
        self.categories.get(&category).and_then(|b| b.status_of(site))
    }

    /// No site in any category
    pub fn is_empty(&self) -> bool {
        self.categories.values().all(SiteBuckets::is_empty)
    }

    /// Every listed category has at least one site
    pub fn every_category_filled(&self) -> bool {
        !self.categories.is_empty() && self.categories.values().all(|b| !b.is_empty())
    }

    pub fn site_count(&self) -> usize {
        self.categories.values().map(SiteBuckets::len).sum()
    }

    pub fn available_count(&self) -> usize {
        self.categories.values().map(|b| b.available().len()).sum()
    }
}
