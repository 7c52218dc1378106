use anyhow::{Context, Result};
use std::time::Duration;

use campwatch::config::Config;
use campwatch::models::SourceId;
use campwatch::service::{AvailabilityService, PollResponse};
use campwatch::sources;
use campwatch::utils::parse_iso_date;

/// Poll one source until the answer is no longer pending, then print it
pub async fn poll(
    config: Config,
    source: String,
    date: Option<String>,
    interval_ms: u64,
) -> Result<()> {
    let source_id = SourceId::parse(&source)
        .with_context(|| format!("Unknown source: {source}"))?;
    let date = date
        .as_deref()
        .map(parse_iso_date)
        .transpose()
        .context("Invalid date, expected YYYY-MM-DD")?;

    let service = AvailabilityService::from_config(&config)
        .context("Failed to build availability service")?;

    let interval = Duration::from_millis(interval_ms.max(100));
    let response = loop {
        let response = service.poll(source_id, date).await;
        if let PollResponse::Pending { tries, max, .. } = &response {
            tracing::info!(source = %source_id, tries, max, "Waiting for fetch job");
            tokio::time::sleep(interval).await;
            continue;
        }
        break response;
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    service.shutdown();
    Ok(())
}

/// Print the source catalog
pub async fn sources() -> Result<()> {
    println!("Sources");
    println!("=======");
    for spec in sources::catalog() {
        let categories: Vec<String> = spec
            .categories
            .iter()
            .map(|c| match spec.capacity(*c) {
                Some(n) => format!("{} ({n})", c.korean_name()),
                None => c.korean_name().to_string(),
            })
            .collect();
        println!(
            "  {:<11} {:<8} {:?}: {}",
            spec.id.as_str(),
            spec.id.korean_name(),
            spec.kind,
            categories.join(", ")
        );
    }
    Ok(())
}
