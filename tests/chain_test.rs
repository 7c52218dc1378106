//! Tier chain over mock reservation pages

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use campwatch::crawler::{
    BrowserPolicy, BrowserSession, FlowTuning, PageFetcher, SessionLauncher, SessionLimiter,
};
use campwatch::models::{Category, QueryKey, SiteId, SiteStatus, SourceId};
use campwatch::sources::{self, ChainDeps};
use campwatch::utils::error::AutomationError;

/// Launcher that records launches and never produces a session
#[derive(Default)]
struct NoBrowser {
    launches: AtomicUsize,
}

#[async_trait]
impl SessionLauncher for NoBrowser {
    async fn launch(&self) -> Result<BrowserSession, AutomationError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Err(AutomationError::LoginRequired("no browser in tests".into()))
    }
}

const FORM_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
  <form action="/camp/search" method="post">
    <input type="hidden" name="mode" value="list">
    <input type="text" name="useDate" value="">
    <input type="checkbox" name="agree" value="Y">
    <button type="submit">조회</button>
  </form>
  <p>날짜를 선택하세요</p>
</body></html>"#;

const POST_RESULT: &str = r#"<!DOCTYPE html>
<html><body>
  <button class="b1" title="예약가능">카라반 05</button>
  <button class="b1" title="예약불가">오토 12</button>
</body></html>"#;

const EMPTY_RESULT: &str = "<html><body><p>조회 결과가 없습니다</p></body></html>";

fn deps(launcher: Arc<NoBrowser>) -> ChainDeps {
    ChainDeps {
        fetcher: Arc::new(PageFetcher::new(&common::fast_http()).unwrap()),
        launcher,
        limiter: SessionLimiter::new(1),
        policy: BrowserPolicy::default(),
        tuning: FlowTuning::default(),
    }
}

async fn yeongdo_site(post_body: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/camp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FORM_PAGE))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/camp/search"))
        .and(body_string_contains("useDate=2025-07-04"))
        .and(body_string_contains("mode=list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(post_body.to_string()))
        .expect(1)
        .mount(&server)
        .await;

    server
}

/// GET finds nothing, POST finds a caravan and an auto site, browser never runs
#[tokio::test]
async fn test_post_tier_result_skips_browser() {
    let server = yeongdo_site(POST_RESULT).await;
    let launcher = Arc::new(NoBrowser::default());

    let spec = sources::spec(SourceId::Yeongdo);
    let chain = sources::build_chain(spec, Some(format!("{}/camp", server.uri())), &deps(launcher.clone()));
    let key = QueryKey::new(SourceId::Yeongdo, common::test_date());

    let result = chain.run(key).await.unwrap();

    assert_eq!(
        result.status_of(Category::Caravan, &SiteId::from_number(5)),
        Some(SiteStatus::Available)
    );
    assert_eq!(
        result.status_of(Category::Auto, &SiteId::from_number(12)),
        Some(SiteStatus::Unavailable)
    );
    assert_eq!(result.site_count(), 2);
    assert!(result.category(Category::General).unwrap().is_empty());
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

/// Every tier empty: the skeleton comes back as a ready result
#[tokio::test]
async fn test_all_tiers_empty_is_skeleton() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/camp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_RESULT))
        .mount(&server)
        .await;

    // Browser tier with a flow that reports an empty page
    let spec = sources::spec(SourceId::Yeongdo);
    let url = format!("{}/camp", server.uri());
    let fetcher = Arc::new(PageFetcher::new(&common::fast_http()).unwrap());
    let chain = campwatch::crawler::StrategyChain::new(spec.id, spec.categories)
        .tier(Arc::new(campwatch::crawler::GetTier::new(
            fetcher.clone(),
            url,
            sources::parser_for(spec.id),
        )))
        .tier(Arc::new(campwatch::crawler::PostTier::new(
            fetcher,
            sources::parser_for(spec.id),
        )))
        .tier(common::CountingTier::new(
            campwatch::crawler::TierKind::Browser,
            || campwatch::crawler::TierOutcome::Empty,
        ));

    let result = chain
        .run(QueryKey::new(SourceId::Yeongdo, common::test_date()))
        .await
        .unwrap();

    assert_eq!(result, spec.skeleton());
    let categories: Vec<Category> = result.categories().map(|(c, _)| *c).collect();
    assert_eq!(categories.len(), 3);
}

/// A browser fault after empty static tiers surfaces as an error
#[tokio::test]
async fn test_browser_fault_with_no_data_is_error() {
    let server = yeongdo_site(EMPTY_RESULT).await;
    let launcher = Arc::new(NoBrowser::default());

    let spec = sources::spec(SourceId::Yeongdo);
    let chain = sources::build_chain(spec, Some(format!("{}/camp", server.uri())), &deps(launcher.clone()));

    let err = chain
        .run(QueryKey::new(SourceId::Yeongdo, common::test_date()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        campwatch::error::Error::Automation(AutomationError::LoginRequired(_))
    ));
    // Login prompts are not retried
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
}

/// A realtime board is a single GET against the per-date URL
#[tokio::test]
async fn test_realtime_template_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reservation/real_time"))
        .and(wiremock::matchers::query_param("resdate", "2025-07-04"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a class="cbtn area_b cbtn_on"><input class="sitename" value="14"></a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let spec = sources::spec(SourceId::Daejeo);
    let template = format!("{}/reservation/real_time?resdate={{date}}&schGugun=1", server.uri());
    let chain = sources::build_chain(spec, Some(template), &deps(Arc::new(NoBrowser::default())));

    let result = chain
        .run(QueryKey::new(SourceId::Daejeo, common::test_date()))
        .await
        .unwrap();
    assert_eq!(
        result.status_of(Category::AreaB, &SiteId::new("14")),
        Some(SiteStatus::Available)
    );
    assert_eq!(result.categories().count(), 4);
}
