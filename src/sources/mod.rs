//! Source catalog and per-source chain assembly
//!
//! Each [`SourceSpec`] says what kind of site a source is, where its page
//! lives, and which categories its result always lists. [`build_chain`]
//! turns a spec into the tiers that scrape it.

pub mod gudeok;
pub mod interpark;
pub mod realtime;
pub mod yeongdo;

use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::crawler::chain::{Completeness, StrategyChain};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::interact::{BrowserFlow, FlowTuning};
use crate::crawler::limiter::SessionLimiter;
use crate::crawler::tiers::{BrowserPolicy, BrowserTier, GetTier, PostTier};
use crate::crawler::webdriver::SessionLauncher;
use crate::models::{AvailabilityResult, Category, SourceId};
use crate::parser::{PageParser, SiteButtonParser};

use gudeok::GudeokFlow;
use interpark::InterparkFlow;
use realtime::RealtimeBoardParser;
use yeongdo::YeongdoFlow;

/// Query string shared by the real-time boards; only `resdate` varies
const REALTIME_QUERY: &str = "user_id=&site_id=&site_type=&site_name=&dis_rate=0&user_dis_rate=&reqcode=&reqname=&reqphone=&reservation_type=0&resdate={date}&schGugun=1&price=0&bagprice=2000&allprice=0&percnt=0&g-recaptcha-response=";

/// How a source is scraped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Server-rendered board, one GET per date
    Realtime,
    /// GET, then form POST, then browser
    Interactive,
    /// Only a browser gets anywhere
    BrowserOnly,
}

/// Static description of one source
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub id: SourceId,
    pub kind: SourceKind,
    /// Page URL; real-time boards use a `{date}` template
    pub default_url: &'static str,
    pub categories: &'static [Category],
    /// Number of sites per category, where known
    pub capacities: &'static [(Category, u32)],
    /// When the chain may stop; configurable per source
    pub completeness: Completeness,
}

/// Catalog entry as served by the API
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub id: SourceId,
    pub name: &'static str,
    pub kind: SourceKind,
    pub categories: Vec<CategoryInfo>,
    pub skeleton: AvailabilityResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub category: Category,
    pub name: &'static str,
    pub capacity: Option<u32>,
}

lazy_static::lazy_static! {
    static ref REALTIME_URLS: [String; 3] = [
        format!("https://www.nakdongcamping.com/reservation/real_time?{REALTIME_QUERY}"),
        format!("https://www.daejeocamping.com/reservation/real_time?{REALTIME_QUERY}"),
        format!("https://hwamyungcamping.com/reservation/real_time?{REALTIME_QUERY}"),
    ];

    static ref CATALOG: Vec<SourceSpec> = vec![
        SourceSpec {
            id: SourceId::Samnak,
            kind: SourceKind::Realtime,
            default_url: REALTIME_URLS[0].as_str(),
            categories: realtime::STANDARD_AREAS,
            capacities: &[],
            completeness: Completeness::AnySite,
        },
        SourceSpec {
            id: SourceId::Daejeo,
            kind: SourceKind::Realtime,
            default_url: REALTIME_URLS[1].as_str(),
            categories: realtime::STANDARD_AREAS,
            capacities: &[],
            completeness: Completeness::AnySite,
        },
        SourceSpec {
            id: SourceId::Hwamyeong,
            kind: SourceKind::Realtime,
            default_url: REALTIME_URLS[2].as_str(),
            categories: realtime::SPLIT_AREAS,
            capacities: &[],
            completeness: Completeness::AnySite,
        },
        SourceSpec {
            id: SourceId::Yeongdo,
            kind: SourceKind::Interactive,
            default_url: "https://www.yeongdo.go.kr/marinocamping/00003/00015/00028.web",
            categories: yeongdo::CATEGORIES,
            capacities: &[
                (Category::Caravan, 15),
                (Category::Auto, 40),
                (Category::General, 12),
            ],
            completeness: Completeness::AnySite,
        },
        SourceSpec {
            id: SourceId::BusanPort,
            kind: SourceKind::BrowserOnly,
            default_url: "https://www.busanpa.com/redevelopment/Board.do?mCode=MN0082",
            categories: interpark::CATEGORIES,
            capacities: &[(Category::Auto, 16), (Category::Deck, 24)],
            completeness: Completeness::AnySite,
        },
        SourceSpec {
            id: SourceId::Gudeok,
            kind: SourceKind::BrowserOnly,
            default_url: "https://gudeok.go.kr/rent_camp01.php",
            categories: gudeok::CATEGORIES,
            capacities: &[(Category::Deck, 18)],
            completeness: Completeness::AnySite,
        },
    ];
}

/// Every source in display order
pub fn catalog() -> &'static [SourceSpec] {
    &CATALOG
}

/// Spec for one source
pub fn spec(id: SourceId) -> &'static SourceSpec {
    let index = SourceId::ALL
        .iter()
        .position(|s| *s == id)
        .unwrap_or_default();
    &CATALOG[index]
}

impl SourceSpec {
    /// Every category present, no sites
    pub fn skeleton(&self) -> AvailabilityResult {
        AvailabilityResult::skeleton(self.categories.iter().copied())
    }

    pub fn capacity(&self, category: Category) -> Option<u32> {
        self.capacities
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
    }

    /// Configured completeness, falling back to the catalog's
    pub fn resolve_completeness(&self, config: &Config) -> Completeness {
        config.source_completeness(self.id).unwrap_or(self.completeness)
    }

    /// Configured URL, falling back to the built-in one; `None` if blanked out
    pub fn resolve_url(&self, config: &Config) -> Option<String> {
        let url = config.source_url(self.id).unwrap_or(self.default_url).trim();
        if url.is_empty() {
            None
        } else {
            Some(url.to_string())
        }
    }

    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            id: self.id,
            name: self.id.korean_name(),
            kind: self.kind,
            categories: self
                .categories
                .iter()
                .map(|c| CategoryInfo {
                    category: *c,
                    name: c.korean_name(),
                    capacity: self.capacity(*c),
                })
                .collect(),
            skeleton: self.skeleton(),
        }
    }
}

/// Parser for the static markup of a source
pub fn parser_for(id: SourceId) -> Arc<dyn PageParser> {
    match id {
        SourceId::Hwamyeong => Arc::new(RealtimeBoardParser::split_area_d()),
        SourceId::Samnak | SourceId::Daejeo => Arc::new(RealtimeBoardParser::standard()),
        _ => Arc::new(SiteButtonParser::new(spec(id).categories)),
    }
}

/// Browser automation for a source, if it has any
pub fn flow_for(id: SourceId) -> Option<Arc<dyn BrowserFlow>> {
    match id {
        SourceId::Yeongdo => Some(Arc::new(YeongdoFlow)),
        SourceId::Gudeok => Some(Arc::new(GudeokFlow)),
        SourceId::BusanPort => Some(Arc::new(InterparkFlow)),
        SourceId::Samnak | SourceId::Daejeo | SourceId::Hwamyeong => None,
    }
}

/// Shared machinery the tiers are built from
#[derive(Clone)]
pub struct ChainDeps {
    pub fetcher: Arc<PageFetcher>,
    pub launcher: Arc<dyn SessionLauncher>,
    pub limiter: SessionLimiter,
    pub policy: BrowserPolicy,
    pub tuning: FlowTuning,
}

impl ChainDeps {
    fn browser_tier(&self, id: SourceId, url: &str) -> Option<Arc<BrowserTier>> {
        let flow = flow_for(id)?;
        Some(Arc::new(
            BrowserTier::new(self.launcher.clone(), flow, self.limiter.clone(), url)
                .with_policy(self.policy.clone())
                .with_tuning(self.tuning.clone()),
        ))
    }
}

/// Chain for `spec` with the URL and completeness from `config`
pub fn chain_for(spec: &SourceSpec, config: &Config, deps: &ChainDeps) -> StrategyChain {
    build_chain(spec, spec.resolve_url(config), deps).completeness(spec.resolve_completeness(config))
}

/// Assemble the tier chain for `spec`
///
/// A source without a URL gets a chain that fails with a configuration error.
pub fn build_chain(spec: &SourceSpec, url: Option<String>, deps: &ChainDeps) -> StrategyChain {
    let Some(url) = url else {
        return StrategyChain::misconfigured(
            spec.id,
            spec.categories,
            format!("no page URL configured for source '{}'", spec.id),
        );
    };

    let mut chain =
        StrategyChain::new(spec.id, spec.categories).completeness(spec.completeness);

    if matches!(spec.kind, SourceKind::Realtime | SourceKind::Interactive) {
        let parser = parser_for(spec.id);
        chain = chain.tier(Arc::new(GetTier::new(
            deps.fetcher.clone(),
            url.clone(),
            parser.clone(),
        )));
        if spec.kind == SourceKind::Interactive {
            chain = chain.tier(Arc::new(PostTier::new(deps.fetcher.clone(), parser)));
        }
    }

    if matches!(spec.kind, SourceKind::Interactive | SourceKind::BrowserOnly) {
        if let Some(tier) = deps.browser_tier(spec.id, &url) {
            chain = chain.tier(tier);
        }
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserConfig;
    use crate::crawler::chain::TierKind;
    use crate::crawler::webdriver::WebDriverClient;
    use crate::config::HttpConfig;

    fn deps() -> ChainDeps {
        ChainDeps {
            fetcher: Arc::new(PageFetcher::new(&HttpConfig::default()).unwrap()),
            launcher: Arc::new(WebDriverClient::new(&BrowserConfig::default()).unwrap()),
            limiter: SessionLimiter::new(2),
            policy: BrowserPolicy::default(),
            tuning: FlowTuning::default(),
        }
    }

    #[test]
    fn test_catalog_order_matches_ids() {
        let ids: Vec<SourceId> = catalog().iter().map(|s| s.id).collect();
        assert_eq!(ids, SourceId::ALL.to_vec());
        for id in SourceId::ALL {
            assert_eq!(spec(id).id, id);
        }
    }

    #[test]
    fn test_realtime_urls_are_templates() {
        for id in [SourceId::Samnak, SourceId::Daejeo, SourceId::Hwamyeong] {
            assert!(spec(id).default_url.contains("resdate={date}"));
            assert!(spec(id).default_url.contains("/reservation/real_time?"));
        }
    }

    #[test]
    fn test_skeletons() {
        let yeongdo = spec(SourceId::Yeongdo).skeleton();
        assert_eq!(yeongdo.categories().count(), 3);
        assert!(yeongdo.is_empty());
        assert_eq!(spec(SourceId::Hwamyeong).skeleton().categories().count(), 5);
        assert_eq!(spec(SourceId::Gudeok).capacity(Category::Deck), Some(18));
        assert_eq!(spec(SourceId::Samnak).capacity(Category::AreaA), None);
    }

    #[test]
    fn test_url_override_and_blank() {
        let mut config = Config::default();
        let yeongdo = spec(SourceId::Yeongdo);
        assert_eq!(yeongdo.resolve_url(&config).as_deref(), Some(yeongdo.default_url));

        config.sources.insert(
            "yeongdo".into(),
            crate::config::SourceOverride {
                url: Some("http://localhost:9000/page".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            yeongdo.resolve_url(&config).as_deref(),
            Some("http://localhost:9000/page")
        );

        config.sources.insert(
            "yeongdo".into(),
            crate::config::SourceOverride {
                url: Some("  ".into()),
                ..Default::default()
            },
        );
        assert!(yeongdo.resolve_url(&config).is_none());
    }

    #[test]
    fn test_chain_shapes() {
        let deps = deps();
        let kinds = |id: SourceId| {
            let spec = spec(id);
            build_chain(spec, Some(spec.default_url.to_string()), &deps).tier_kinds()
        };
        assert_eq!(kinds(SourceId::Samnak), vec![TierKind::Get]);
        assert_eq!(
            kinds(SourceId::Yeongdo),
            vec![TierKind::Get, TierKind::Post, TierKind::Browser]
        );
        assert_eq!(kinds(SourceId::Gudeok), vec![TierKind::Browser]);
        assert_eq!(kinds(SourceId::BusanPort), vec![TierKind::Browser]);
    }

    #[test]
    fn test_completeness_override() {
        let deps = deps();
        let yeongdo = spec(SourceId::Yeongdo);
        let mut config = Config::default();
        assert_eq!(yeongdo.resolve_completeness(&config), Completeness::AnySite);
        assert_eq!(
            chain_for(yeongdo, &config, &deps).stop_policy(),
            Completeness::AnySite
        );

        config.sources.insert(
            "yeongdo".into(),
            crate::config::SourceOverride {
                completeness: Some(Completeness::EveryCategory),
                ..Default::default()
            },
        );
        let chain = chain_for(yeongdo, &config, &deps);
        assert_eq!(chain.stop_policy(), Completeness::EveryCategory);
        assert_eq!(
            chain.tier_kinds(),
            vec![TierKind::Get, TierKind::Post, TierKind::Browser]
        );
        assert_eq!(
            chain_for(spec(SourceId::Gudeok), &config, &deps).stop_policy(),
            Completeness::AnySite
        );
    }

    #[tokio::test]
    async fn test_missing_url_is_config_error() {
        let chain = build_chain(spec(SourceId::Gudeok), None, &deps());
        let key = crate::models::QueryKey::new(
            SourceId::Gudeok,
            chrono::NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
        );
        assert!(matches!(
            chain.run(key).await,
            Err(crate::error::Error::Config(_))
        ));
    }
}
