//! Progress ticker for in-flight jobs
//!
//! Purely cosmetic progress: the counter says how long a job has been
//! running, not how far along it is. One detached task per registration.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::CoalescingCache;

/// Tick `generation`'s entry every interval until it is released or replaced
pub fn spawn(cache: Arc<CoalescingCache>, date: NaiveDate, generation: u64) -> JoinHandle<()> {
    let interval = cache.settings().tick_interval;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if !cache.tick(date, generation).await {
                break;
            }
        }
        tracing::trace!(source = %cache.source(), date = %date, generation, "Progress ticker stopped");
    })
}
