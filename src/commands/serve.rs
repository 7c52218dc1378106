use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use campwatch::config::Config;
use campwatch::server::CampwatchServer;
use campwatch::service::AvailabilityService;

/// Run the HTTP surface until Ctrl+C
pub async fn serve(config: Config, bind: Option<SocketAddr>) -> Result<()> {
    let bind_address = match bind {
        Some(addr) => addr,
        None => config.bind_address()?,
    };

    let service = Arc::new(
        AvailabilityService::from_config(&config).context("Failed to build availability service")?,
    );
    let server = CampwatchServer::new(service, config.server.clone(), bind_address);

    println!("campwatch server");
    println!("{:-<40}", "");
    println!("Bind Address: {bind_address}");
    println!(
        "Scraping: {}",
        if config.scrape.enabled { "enabled" } else { "disabled" }
    );
    println!("Browser Sessions: {}", config.scrape.max_browser_sessions);
    println!("WebDriver: {}", config.browser.webdriver_url);
    println!();
    println!("API Endpoints:");
    println!("  GET  /api/availability/{{source}}?date=YYYY-MM-DD - Poll availability");
    println!("  GET  /api/sources                              - List sources");
    println!("  GET  /api/stats                                - Cache and session stats");
    println!();
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("campwatch server stopped.");
    Ok(())
}
