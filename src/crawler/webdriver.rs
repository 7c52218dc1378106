//! Minimal W3C WebDriver client
//!
//! Speaks the JSON wire protocol to chromedriver over `reqwest`. Only the
//! commands the reservation flows need are wrapped. Each session owns a
//! disposable Chrome profile directory; closing the session (or dropping
//! it) deletes the WebDriver session and removes the directory.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;

use crate::config::BrowserConfig;
use crate::utils::error::AutomationError;
use crate::utils::truncate_for_log;

/// W3C element reference key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a8e9d1d0e7a";

/// Opens fresh browser sessions
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Start a session with a brand-new profile
    async fn launch(&self) -> Result<BrowserSession, AutomationError>;
}

/// Reference to an element inside a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    /// JSON form accepted as a script argument
    pub fn to_arg(&self) -> Value {
        let mut reference = serde_json::Map::new();
        reference.insert(ELEMENT_KEY.to_string(), Value::String(self.0.clone()));
        Value::Object(reference)
    }
}

/// Selector strategy for element lookup
#[derive(Debug, Clone, Copy)]
pub enum Locator<'a> {
    Css(&'a str),
    XPath(&'a str),
}

impl Locator<'_> {
    fn to_body(self) -> Value {
        match self {
            Locator::Css(value) => json!({"using": "css selector", "value": value}),
            Locator::XPath(value) => json!({"using": "xpath", "value": value}),
        }
    }
}

async fn send_command(
    http: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    command: &str,
) -> Result<Value, AutomationError> {
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let payload: Value = serde_json::from_str(&text).map_err(|e| {
        AutomationError::Protocol(format!(
            "{command}: {e}; body={}",
            truncate_for_log(&text, 220)
        ))
    })?;

    if let Some(error) = payload.pointer("/value/error").and_then(Value::as_str) {
        let message = payload
            .pointer("/value/message")
            .and_then(Value::as_str)
            .unwrap_or("unknown webdriver error");
        return Err(AutomationError::from_command(
            command,
            error,
            &truncate_for_log(message, 300),
        ));
    }

    if !status.is_success() {
        return Err(AutomationError::Protocol(format!(
            "{command}: HTTP {}: {}",
            status.as_u16(),
            truncate_for_log(&text, 220)
        )));
    }

    Ok(payload.get("value").cloned().unwrap_or(Value::Null))
}

/// WebDriver endpoint plus the Chrome settings every session gets
pub struct WebDriverClient {
    http: Client,
    endpoint: String,
    config: BrowserConfig,
}

impl WebDriverClient {
    /// # Errors
    ///
    /// `AutomationError::Transport` if the HTTP client cannot be built
    pub fn new(config: &BrowserConfig) -> Result<Self, AutomationError> {
        // Commands may block for a full page load
        let http = Client::builder()
            .timeout(Duration::from_secs(config.page_load_timeout_secs + 15))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.webdriver_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Chrome capabilities for a session using `profile` as its user data dir
    pub fn capabilities(&self, profile: &std::path::Path) -> Value {
        let mut args = vec![
            format!("--user-data-dir={}", profile.join("data").display()),
            format!("--disk-cache-dir={}", profile.join("cache").display()),
            format!("--window-size={}", self.config.window_size),
            format!("--user-agent={}", self.config.user_agent),
            "--lang=ko-KR".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-extensions".to_string(),
            "--remote-debugging-port=0".to_string(),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }

        let mut chrome_options = json!({
            "args": args,
            "prefs": { "intl.accept_languages": "ko-KR,ko" }
        });
        if let Some(binary) = &self.config.chrome_binary {
            chrome_options["binary"] = json!(binary);
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "normal",
                    "unhandledPromptBehavior": "ignore",
                    "goog:chromeOptions": chrome_options
                }
            }
        })
    }
}

#[async_trait]
impl SessionLauncher for WebDriverClient {
    async fn launch(&self) -> Result<BrowserSession, AutomationError> {
        let profile = tempfile::Builder::new()
            .prefix("campwatch-profile-")
            .tempdir()?;
        std::fs::create_dir_all(profile.path().join("data"))?;
        std::fs::create_dir_all(profile.path().join("cache"))?;

        let created = send_command(
            &self.http,
            Method::POST,
            &format!("{}/session", self.endpoint),
            Some(self.capabilities(profile.path())),
            "new session",
        )
        .await
        .map_err(|e| match e {
            AutomationError::Command { error, message, .. } => {
                AutomationError::Session(format!("session not created ({error}): {message}"))
            }
            other => other,
        })?;

        let session_id = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| AutomationError::Protocol("new session: missing sessionId".into()))?
            .to_string();

        tracing::debug!(session = %session_id, profile = %profile.path().display(), "Browser session started");

        let session = BrowserSession {
            http: self.http.clone(),
            base: format!("{}/session/{}", self.endpoint, session_id),
            id: session_id,
            profile: Some(profile),
            closed: false,
        };

        let timeouts = json!({
            "pageLoad": self.config.page_load_timeout_secs * 1000,
            "script": self.config.script_timeout_secs * 1000,
        });
        if let Err(e) = session
            .command(Method::POST, "/timeouts", Some(timeouts), "set timeouts")
            .await
        {
            session.close().await;
            return Err(e);
        }

        Ok(session)
    }
}

/// One live browser session, exclusively owned by one attempt
pub struct BrowserSession {
    http: Client,
    base: String,
    id: String,
    profile: Option<TempDir>,
    closed: bool,
}

impl BrowserSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Profile directory backing this session, while it exists
    pub fn profile_dir(&self) -> Option<&std::path::Path> {
        self.profile.as_ref().map(TempDir::path)
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        name: &str,
    ) -> Result<Value, AutomationError> {
        send_command(&self.http, method, &format!("{}{path}", self.base), body, name).await
    }

    pub async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })), "navigate")
            .await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String, AutomationError> {
        let value = self.command(Method::GET, "/url", None, "current url").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Run a synchronous script and return its result
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, AutomationError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
            "execute",
        )
        .await
    }

    pub async fn find_elements(
        &self,
        locator: Locator<'_>,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        let value = self
            .command(Method::POST, "/elements", Some(locator.to_body()), "find elements")
            .await?;

        Ok(value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(|id| ElementHandle(id.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
            "click",
        )
        .await?;
        Ok(())
    }

    /// Enter frame `index` of the current document, or return to the top
    /// document with `None`
    pub async fn switch_to_frame(&self, index: Option<u32>) -> Result<(), AutomationError> {
        let id = index.map(Value::from).unwrap_or(Value::Null);
        self.command(Method::POST, "/frame", Some(json!({ "id": id })), "switch frame")
            .await?;
        Ok(())
    }

    pub async fn window_handle(&self) -> Result<String, AutomationError> {
        let value = self.command(Method::GET, "/window", None, "window handle").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn window_handles(&self) -> Result<Vec<String>, AutomationError> {
        let value = self
            .command(Method::GET, "/window/handles", None, "window handles")
            .await?;
        Ok(value
            .as_array()
            .map(|v| v.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default())
    }

    pub async fn switch_to_window(&self, handle: &str) -> Result<(), AutomationError> {
        self.command(
            Method::POST,
            "/window",
            Some(json!({ "handle": handle })),
            "switch window",
        )
        .await?;
        Ok(())
    }

    /// Close the current window (not the session)
    pub async fn close_window(&self) -> Result<(), AutomationError> {
        self.command(Method::DELETE, "/window", None, "close window")
            .await?;
        Ok(())
    }

    /// Text of an open alert, `None` when there is none
    pub async fn alert_text(&self) -> Result<Option<String>, AutomationError> {
        match self.command(Method::GET, "/alert/text", None, "alert text").await {
            Ok(value) => Ok(value.as_str().map(str::to_string)),
            Err(AutomationError::Command { error, .. }) if error == "no such alert" => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Accept an open alert, if any
    pub async fn accept_alert(&self) -> Result<(), AutomationError> {
        match self
            .command(Method::POST, "/alert/accept", Some(json!({})), "accept alert")
            .await
        {
            Ok(_) => Ok(()),
            Err(AutomationError::Command { error, .. }) if error == "no such alert" => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Delete the WebDriver session and remove the profile directory
    pub async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.command(Method::DELETE, "", None, "delete session").await {
            tracing::debug!(session = %self.id, error = %e, "Session delete failed");
        }
        if let Some(profile) = self.profile.take() {
            if let Err(e) = profile.close() {
                tracing::warn!(session = %self.id, error = %e, "Profile directory cleanup failed");
            }
        }
        tracing::debug!(session = %self.id, "Browser session closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Abandoned mid-flight (panic or cancelled attempt): delete in the background.
        // The profile TempDir is removed when it drops with us.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let http = self.http.clone();
            let url = self.base.clone();
            let id = self.id.clone();
            handle.spawn(async move {
                if let Err(e) = http.delete(&url).send().await {
                    tracing::debug!(session = %id, error = %e, "Background session delete failed");
                }
            });
        }
    }
}
