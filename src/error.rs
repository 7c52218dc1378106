//! Crate-level error type
//!
//! [`Error`] wraps the per-concern errors from [`crate::utils::error`]. The
//! chain inspects the [`ErrorCategory`] to decide whether a fault becomes the
//! job's `error` response or just means the tier found nothing, and
//! [`ScrapeErrorTrait::korean_desc`] renders the message pollers see.
//!
//! # Usage
//!
//! ```rust,ignore
//! use campwatch::error::{Error, ScrapeErrorTrait};
//!
//! fn report(err: &Error) -> String {
//!     format!("{}: {}", err.category().korean_desc(), err.korean_desc())
//! }
//! ```

use thiserror::Error;

pub use crate::utils::error::{AutomationError, FetchError, ParseError};

/// Behavior shared by every campwatch error
pub trait ScrapeErrorTrait: std::error::Error {
    /// Whether another attempt could succeed
    fn is_recoverable(&self) -> bool;

    /// Message shown to pollers, in the language of the target sites
    fn korean_desc(&self) -> String;

    fn category(&self) -> ErrorCategory;
}

/// Coarse error classes the strategy chain reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// HTTP, timeout and connection errors
    Network,
    /// Markup that could not be interpreted
    Parsing,
    /// Browser automation faults
    Automation,
    /// Configuration and validation errors
    Config,
    /// The job died without reporting (a panicked chain)
    Other,
}

impl ErrorCategory {
    /// Korean description for the category
    pub fn korean_desc(&self) -> &'static str {
        match self {
            Self::Network => "네트워크 오류",
            Self::Parsing => "파싱 오류",
            Self::Automation => "브라우저 자동화 오류",
            Self::Config => "설정 오류",
            Self::Other => "기타 오류",
        }
    }
}

/// Unified error type for the campwatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Browser automation errors
    #[error("Automation error: {0}")]
    Automation(#[from] AutomationError),

    /// Configuration errors (e.g. a source without a URL)
    #[error("Config error: {0}")]
    Config(String),
}

impl ScrapeErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::MaxRetriesExceeded { .. } => true,
            Self::ServerError(code) => *code >= 500 || *code == 429,
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }

    fn korean_desc(&self) -> String {
        match self {
            Self::Http(e) => format!("HTTP 요청 실패: {e}"),
            Self::ServerError(code) => format!("서버 오류 ({code})"),
            Self::Timeout => "요청 시간 초과".to_string(),
            Self::MaxRetriesExceeded { .. } => "최대 재시도 횟수 초과".to_string(),
            Self::Decode(msg) => format!("인코딩 해석 실패: {msg}"),
            Self::InvalidUrl(url) => format!("잘못된 URL: {url}"),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

impl ScrapeErrorTrait for ParseError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn korean_desc(&self) -> String {
        match self {
            Self::FormNotFound => "재전송할 폼이 없습니다".to_string(),
            Self::InvalidAction(action) => format!("잘못된 폼 action: {action}"),
            Self::InvalidDate(date) => format!("잘못된 날짜: {date}"),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl ScrapeErrorTrait for AutomationError {
    fn is_recoverable(&self) -> bool {
        self.is_session_fault()
    }

    fn korean_desc(&self) -> String {
        match self {
            Self::Session(msg) => format!("브라우저 세션 실패: {msg}"),
            Self::Transport(e) => format!("WebDriver 연결 실패: {e}"),
            Self::Command { command, message, .. } => {
                format!("브라우저 명령 실패 ({command}): {message}")
            }
            Self::Timeout(stage) => format!("시간 초과: {stage}"),
            Self::LoginRequired(msg) => format!("로그인이 필요합니다: {msg}"),
            Self::ElementNotFound(what) => format!("요소를 찾을 수 없습니다: {what}"),
            Self::Protocol(msg) => format!("WebDriver 응답 오류: {msg}"),
            Self::Profile(e) => format!("브라우저 프로필 준비 실패: {e}"),
            Self::LimiterClosed => "세션 제한기가 종료되었습니다".to_string(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Automation
    }
}

impl ScrapeErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Automation(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }

    fn korean_desc(&self) -> String {
        match self {
            Self::Fetch(e) => e.korean_desc(),
            Self::Parse(e) => e.korean_desc(),
            Self::Automation(e) => e.korean_desc(),
            Self::Config(msg) => msg.clone(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Parse(_) => ErrorCategory::Parsing,
            Self::Automation(_) => ErrorCategory::Automation,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error ends a job with an `error` status when no tier
    /// produced data. Network and parse failures only mean "nothing found".
    pub fn surfaces_to_caller(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Automation | ErrorCategory::Config | ErrorCategory::Other
        )
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
