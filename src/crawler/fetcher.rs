//! Page fetcher behind the GET and POST tiers
//!
//! Municipal reservation pages are old, slow and frequently served as
//! EUC-KR. The fetcher keeps one cookie-carrying client for every source,
//! paces requests through a governor quota and retries 429/5xx answers
//! with exponential backoff.

use crate::config::HttpConfig;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};
use encoding_rs::{Encoding, EUC_KR, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT},
    Client, RequestBuilder, StatusCode,
};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Desktop browsers as seen by Korean municipal sites
const BROWSER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Whale/3.27.254.15 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
];

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const KOREAN_FIRST: &str = "ko-KR,ko;q=0.9,en;q=0.6";

/// Upper bound on any single backoff pause
const MAX_BACKOFF_MS: u64 = 10_000;

/// How far into a body to look for a `<meta charset>` declaration
const META_SNIFF_BYTES: usize = 1024;

/// A decoded page together with the URL it was finally served from
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub html: String,
}

/// Why one send attempt did not produce a page
#[derive(Debug, Error)]
enum SendFailure {
    #[error("status {0}")]
    Busy(StatusCode),

    #[error("transport: {0}")]
    Transport(reqwest::Error),

    #[error("{0}")]
    Final(FetchError),
}

impl SendFailure {
    fn is_transient(&self) -> bool {
        !matches!(self, Self::Final(_))
    }

    fn into_fetch_error(self) -> FetchError {
        match self {
            Self::Busy(status) => FetchError::MaxRetriesExceeded {
                last: status.to_string(),
            },
            Self::Transport(e) if e.is_timeout() => FetchError::Timeout,
            Self::Transport(e) => FetchError::Http(e),
            Self::Final(e) => e,
        }
    }
}

/// Reservation page fetcher
///
/// One instance is shared by every source; the cookie store keeps
/// session cookies between a GET and the form POST that follows it.
pub struct PageFetcher {
    client: Client,
    pacer: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    backoff: RetryConfig,
    post_timeout: Duration,
}

impl PageFetcher {
    /// Create a fetcher from the HTTP configuration section
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let per_second = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            pacer: RateLimiter::direct(Quota::per_second(per_second)),
            backoff: RetryConfig::with_delays(
                config.max_retries,
                config.retry_base_delay_ms,
                MAX_BACKOFF_MS,
            ),
            post_timeout: Duration::from_secs(config.post_timeout_secs),
        })
    }

    /// Fetch a page, using the page itself as referer unless told otherwise
    ///
    /// # Errors
    ///
    /// `InvalidUrl` for unparseable input, `ServerError` for final 4xx
    /// answers, `MaxRetriesExceeded` once 429/5xx answers use up the budget
    pub async fn get(&self, url: &str, referer: Option<&str>) -> Result<FetchedPage, FetchError> {
        let target = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let referer = referer.unwrap_or(url);

        tracing::debug!(url = %target, "GET");
        self.send(|| self.client.get(target.clone()).headers(page_headers(referer)))
            .await
    }

    /// Submit a form as `application/x-www-form-urlencoded`
    ///
    /// # Errors
    ///
    /// Same failure modes as [`PageFetcher::get`]
    pub async fn post_form(
        &self,
        action: &Url,
        fields: &[(String, String)],
        referer: &str,
    ) -> Result<FetchedPage, FetchError> {
        tracing::debug!(url = %action, fields = fields.len(), "POST");
        self.send(|| {
            self.client
                .post(action.clone())
                .headers(page_headers(referer))
                .timeout(self.post_timeout)
                .form(fields)
        })
        .await
    }

    async fn send<B>(&self, request: B) -> Result<FetchedPage, FetchError>
    where
        B: Fn() -> RequestBuilder,
    {
        let request = &request;
        let outcome = with_retry_if(
            &self.backoff,
            move |_| async move {
                self.pacer.until_ready().await;
                let response = request().send().await.map_err(SendFailure::Transport)?;

                let status = response.status();
                if !status.is_success() {
                    return Err(if is_transient_status(status) {
                        SendFailure::Busy(status)
                    } else {
                        SendFailure::Final(FetchError::ServerError(status.as_u16()))
                    });
                }

                let url = response.url().clone();
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let body = response.bytes().await.map_err(SendFailure::Transport)?;
                let html = decode_html(&body, &content_type).map_err(SendFailure::Final)?;
                Ok::<_, SendFailure>(FetchedPage { url, html })
            },
            SendFailure::is_transient,
        )
        .await;

        outcome.map_err(SendFailure::into_fetch_error)
    }
}

/// Rate limiting and gateway trouble are worth another try; other
/// non-success answers are the site's final word
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

fn page_headers(referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(pick_agent()));
    headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(KOREAN_FIRST));
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }
    headers
}

fn pick_agent() -> &'static str {
    BROWSER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BROWSER_AGENTS[0])
}

/// Charset named by a `Content-Type` value or a `<meta>` tag, if any
fn declared_charset(content_type: &str, body: &[u8]) -> Option<&'static Encoding> {
    let from_header = content_type
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, label)| Encoding::for_label(label.trim().trim_matches('"').as_bytes()));
    if from_header.is_some() {
        return from_header;
    }

    let head = String::from_utf8_lossy(&body[..body.len().min(META_SNIFF_BYTES)]).to_lowercase();
    let at = head.find("charset=")? + "charset=".len();
    let label: String = head[at..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    Encoding::for_label(label.as_bytes())
}

/// Decode a page body to UTF-8
///
/// A declared charset wins. Undeclared bodies are tried as UTF-8 and then
/// as EUC-KR, which is what the older board software emits.
///
/// # Errors
///
/// Returns `FetchError::Decode` if the body is valid in neither encoding
pub fn decode_html(body: &[u8], content_type: &str) -> Result<String, FetchError> {
    if let Some(encoding) = declared_charset(content_type, body) {
        let (text, _, malformed) = encoding.decode(body);
        if !malformed {
            return Ok(text.into_owned());
        }
        tracing::debug!(charset = encoding.name(), "Declared charset did not fit the body");
    }

    for encoding in [UTF_8, EUC_KR] {
        let (text, _, malformed) = encoding.decode(body);
        if !malformed {
            return Ok(text.into_owned());
        }
    }

    Err(FetchError::Decode(
        "body is neither UTF-8 nor EUC-KR".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookable_euc_kr() -> Vec<u8> {
        EUC_KR.encode("예약가능").0.into_owned()
    }

    #[test]
    fn test_agents_come_from_pool() {
        let seen: std::collections::HashSet<_> = (0..200).map(|_| pick_agent()).collect();
        assert!(seen.iter().all(|agent| BROWSER_AGENTS.contains(agent)));
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_utf8_header() {
        let text = "영도 마리노 캠핑장";
        assert_eq!(decode_html(text.as_bytes(), "text/html; charset=UTF-8").unwrap(), text);
    }

    #[test]
    fn test_euc_kr_header_aliases() {
        for content_type in [
            "text/html; charset=euc-kr",
            "text/html;charset=\"EUC-KR\"",
            "text/html; charset=ks_c_5601-1987",
        ] {
            assert_eq!(decode_html(&bookable_euc_kr(), content_type).unwrap(), "예약가능");
        }
    }

    #[test]
    fn test_meta_charset_sniffed() {
        let mut body = b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=euc-kr\"></head><body>".to_vec();
        body.extend_from_slice(&bookable_euc_kr());
        let html = decode_html(&body, "text/html").unwrap();
        assert!(html.ends_with("예약가능"));
    }

    #[test]
    fn test_undeclared_euc_kr_falls_back() {
        assert_eq!(decode_html(&bookable_euc_kr(), "").unwrap(), "예약가능");
    }

    #[test]
    fn test_page_headers() {
        let referer = "https://www.yeongdo.go.kr/marinocamping/00003/00015/00028.web";
        let headers = page_headers(referer);

        assert_eq!(headers.get(REFERER).unwrap().to_str().unwrap(), referer);
        assert_eq!(headers.get(ACCEPT_LANGUAGE).unwrap(), KOREAN_FIRST);
        assert!(headers.contains_key(USER_AGENT));
    }

    #[test]
    fn test_transient_statuses() {
        for code in [429, 500, 502, 503, 504] {
            assert!(is_transient_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [400, 401, 403, 404, 501] {
            assert!(!is_transient_status(StatusCode::from_u16(code).unwrap()));
        }
    }
}
