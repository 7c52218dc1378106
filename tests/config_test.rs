//! Tests for config loading from files and environment variables

use serial_test::serial;
use std::io::Write;
use std::time::Duration;

use campwatch::config::Config;
use campwatch::models::SourceId;

const VARS: &[&str] = &[
    "CAMPWATCH_DISABLE_SCRAPERS",
    "CAMPWATCH_MAX_BROWSER_SESSIONS",
    "CAMPWATCH_INFLIGHT_MAX_SECS",
    "CAMPWATCH_WEBDRIVER_URL",
    "CAMPWATCH_HEADLESS",
    "CAMPWATCH_LOG_FORMAT",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn test_sample_config_parses() {
    let config = Config::from_file(std::path::Path::new("config.toml")).unwrap();
    assert!(config.validate().is_ok());
    assert!(config.scrape.enabled);
    assert_eq!(config.scrape.max_browser_sessions, 2);
    assert_eq!(config.inflight_ceiling(), Duration::from_secs(100));
}

#[test]
fn test_file_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[scrape]
cache_ttl_secs = 30

[browser]
webdriver_url = "http://chromedriver:9515"

[sources.busan_port]
url = "https://camp.test/port"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.cache_ttl(), Duration::from_secs(30));
    assert_eq!(config.browser.webdriver_url, "http://chromedriver:9515");
    assert_eq!(config.source_url(SourceId::BusanPort), Some("https://camp.test/port"));
    assert_eq!(config.browser.wait_secs, 25);
}

#[test]
fn test_missing_file_is_error() {
    assert!(Config::from_file(std::path::Path::new("does-not-exist.toml")).is_err());
}

#[test]
#[serial]
fn test_env_overlay() {
    clear_env();
    std::env::set_var("CAMPWATCH_DISABLE_SCRAPERS", "1");
    std::env::set_var("CAMPWATCH_MAX_BROWSER_SESSIONS", "4");
    std::env::set_var("CAMPWATCH_INFLIGHT_MAX_SECS", "120");
    std::env::set_var("CAMPWATCH_HEADLESS", "false");

    let config = Config::from_env().unwrap();
    clear_env();

    assert!(!config.scrape.enabled);
    assert_eq!(config.scrape.max_browser_sessions, 4);
    assert_eq!(config.inflight_ceiling(), Duration::from_secs(120));
    assert!(!config.browser.headless);
}

#[test]
#[serial]
fn test_unparseable_env_is_ignored() {
    clear_env();
    std::env::set_var("CAMPWATCH_MAX_BROWSER_SESSIONS", "many");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.scrape.max_browser_sessions, 2);
}

#[test]
#[serial]
fn test_bad_webdriver_url_fails_validation() {
    clear_env();
    std::env::set_var("CAMPWATCH_WEBDRIVER_URL", "not a url");

    let config = Config::from_env().unwrap();
    clear_env();

    assert!(config.validate().is_err());
}
