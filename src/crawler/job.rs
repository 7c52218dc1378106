//! Fetch job: run a source's chain and commit the outcome
//!
//! The chain runs in its own task so that a panic anywhere inside it is
//! caught at the join and committed as a failure. Whatever happens, the
//! job completes its ticket, which releases the in-flight registration.

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::cache::{CoalescingCache, JobOutcome, JobTicket};
use crate::crawler::chain::StrategyChain;
use crate::error::ErrorCategory;

/// Message committed when the chain task dies
const ABORTED_MESSAGE: &str = "수집 작업이 비정상 종료되었습니다";

/// Run the job for `ticket` to completion
pub async fn run(cache: Arc<CoalescingCache>, chain: Arc<StrategyChain>, ticket: JobTicket) {
    let key = ticket.key;
    let started = Instant::now();
    tracing::info!(key = %key, generation = ticket.generation, "Fetch job started");

    let worker = tokio::spawn(async move { chain.run(key).await });

    let outcome = match worker.await {
        Ok(Ok(result)) => {
            tracing::info!(
                key = %key,
                sites = result.site_count(),
                available = result.available_count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Fetch job finished"
            );
            JobOutcome::Ready(result)
        }
        Ok(Err(err)) => {
            tracing::warn!(
                key = %key,
                error = %err,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Fetch job failed"
            );
            JobOutcome::from_error(&err)
        }
        Err(join) => {
            tracing::error!(key = %key, error = %join, "Fetch job aborted");
            JobOutcome::Failed {
                category: ErrorCategory::Other,
                message: format!("{}: {ABORTED_MESSAGE}", ErrorCategory::Other.korean_desc()),
            }
        }
    };

    cache.complete(ticket, outcome).await;
}

/// Detach the job onto the runtime
pub fn spawn(
    cache: Arc<CoalescingCache>,
    chain: Arc<StrategyChain>,
    ticket: JobTicket,
) -> JoinHandle<()> {
    tokio::spawn(run(cache, chain, ticket))
}
