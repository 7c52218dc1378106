//! Process-wide cap on concurrent browser sessions
//!
//! Browser sessions are the expensive resource; every attempt of the
//! browser tier holds one permit from launch to teardown. Permits are
//! RAII guards, so they come back on every exit path including panics.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::utils::error::AutomationError;

/// Counting semaphore over browser sessions
#[derive(Debug, Clone)]
pub struct SessionLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the lifetime of one browser session
#[derive(Debug)]
pub struct SessionPermit {
    _permit: OwnedSemaphorePermit,
}

impl SessionLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free session slot (FIFO)
    ///
    /// # Errors
    ///
    /// `AutomationError::LimiterClosed` if the limiter was shut down
    pub async fn acquire(&self) -> Result<SessionPermit, AutomationError> {
        let started = Instant::now();
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AutomationError::LimiterClosed)?;

        tracing::debug!(
            waited_ms = started.elapsed().as_millis() as u64,
            in_use = self.in_use(),
            capacity = self.capacity,
            "Browser session permit acquired"
        );
        Ok(SessionPermit { _permit: permit })
    }

    /// Maximum number of concurrent sessions
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Refuse all future acquisitions; waiters get `LimiterClosed`
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_permits_bounded_and_released() {
        let limiter = SessionLimiter::new(2);
        let a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        assert_eq!(limiter.in_use(), 2);

        let waiting = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(waiting.is_err(), "third acquire must wait");

        drop(a);
        let c = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(c.is_ok());
    }

    #[tokio::test]
    async fn test_permit_released_on_panic() {
        let limiter = SessionLimiter::new(1);
        let inner = limiter.clone();
        let handle = tokio::spawn(async move {
            let _permit = inner.acquire().await.unwrap();
            panic!("flow blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_closed_limiter() {
        let limiter = SessionLimiter::new(1);
        limiter.close();
        assert!(matches!(
            limiter.acquire().await,
            Err(AutomationError::LimiterClosed)
        ));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(SessionLimiter::new(0).capacity(), 1);
    }
}
