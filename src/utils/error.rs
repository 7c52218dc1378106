//! Error types for the campwatch scrapers
//!
//! Each extraction concern gets its own error enum so the strategy chain can
//! decide how to react: fetch errors fall through to the next tier, parse
//! errors count as "no data", automation errors may earn one retry.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts exceeded (last status: {last})")]
    MaxRetriesExceeded { last: String },

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors that can occur while turning markup into availability
#[derive(Error, Debug)]
pub enum ParseError {
    /// The page had no `<form>` to replay
    #[error("No replayable form found on page")]
    FormNotFound,

    /// Form action could not be resolved against the page URL
    #[error("Invalid form action: {0}")]
    InvalidAction(String),

    /// Invalid date string
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Errors raised while driving a browser session
#[derive(Error, Debug)]
pub enum AutomationError {
    /// The session could not be created or died underneath us
    #[error("Browser session failure: {0}")]
    Session(String),

    /// Could not reach the WebDriver endpoint at all
    #[error("WebDriver transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A WebDriver command returned an error payload
    #[error("WebDriver command '{command}' failed ({error}): {message}")]
    Command {
        command: String,
        error: String,
        message: String,
    },

    /// A wait or the overall attempt budget ran out
    #[error("Timed out during {0}")]
    Timeout(String),

    /// The site demanded a login (alert text attached)
    #[error("Login required: {0}")]
    LoginRequired(String),

    /// An element the flow depends on never appeared
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// WebDriver answered with something we could not read
    #[error("Malformed WebDriver response: {0}")]
    Protocol(String),

    /// Browser profile directory could not be prepared
    #[error("Profile directory error: {0}")]
    Profile(#[from] std::io::Error),

    /// The session limiter was shut down
    #[error("Session limiter closed")]
    LimiterClosed,
}

/// WebDriver error codes that mean the session itself is gone
const SESSION_ERROR_CODES: &[&str] = &[
    "invalid session id",
    "session not created",
    "no such window",
];

impl AutomationError {
    /// Build a command error from a WebDriver error code, promoting
    /// session-level codes to [`AutomationError::Session`]
    pub fn from_command(command: &str, error: &str, message: &str) -> Self {
        let crashed = message.contains("chrome not reachable")
            || message.contains("DevToolsActivePort")
            || message.contains("disconnected");
        if SESSION_ERROR_CODES.contains(&error) || crashed {
            return Self::Session(format!("{command}: {error}: {message}"));
        }
        Self::Command {
            command: command.to_string(),
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this fault warrants a fresh session
    ///
    /// Driver crashes, failed session creation and an unreachable driver
    /// are session-level; everything the page itself does to us is not.
    pub fn is_session_fault(&self) -> bool {
        matches!(
            self,
            Self::Session(_) | Self::Transport(_) | Self::Profile(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_codes_promoted() {
        let err = AutomationError::from_command("navigate", "invalid session id", "gone");
        assert!(matches!(err, AutomationError::Session(_)));
        assert!(err.is_session_fault());
    }

    #[test]
    fn test_crash_message_promoted() {
        let err = AutomationError::from_command(
            "execute",
            "unknown error",
            "unknown error: chrome not reachable",
        );
        assert!(err.is_session_fault());
    }

    #[test]
    fn test_page_errors_stay_command_level() {
        let err = AutomationError::from_command("click", "no such element", "#btn");
        assert!(matches!(err, AutomationError::Command { .. }));
        assert!(!err.is_session_fault());

        assert!(!AutomationError::LoginRequired("로그인".into()).is_session_fault());
        assert!(!AutomationError::Timeout("calendar".into()).is_session_fault());
    }
}
