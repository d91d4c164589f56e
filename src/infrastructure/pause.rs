//! Exponential pause hook for worker backoff signals.
//!
//! Each worker gets its own backoff state: repeated signals from the
//! same worker pause progressively longer, and a calm worker's state is
//! reset once its pause completes without a new signal.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::errors::DomainResult;
use crate::domain::ports::PauseHook;

const INITIAL_PAUSE: Duration = Duration::from_secs(1);
const MAX_PAUSE: Duration = Duration::from_secs(60);

fn fresh_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: INITIAL_PAUSE,
        max_interval: MAX_PAUSE,
        // Never give up; the dispatch timeout bounds the attempt.
        max_elapsed_time: None,
        randomization_factor: 0.0,
        ..ExponentialBackoff::default()
    }
}

/// Pauses callers with per-worker exponential delays.
#[derive(Default)]
pub struct ExponentialPauseHook {
    state: Mutex<HashMap<String, ExponentialBackoff>>,
}

impl ExponentialPauseHook {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PauseHook for ExponentialPauseHook {
    async fn on_backoff(&self, worker: &str) -> DomainResult<()> {
        let delay = {
            let mut state = self.state.lock().await;
            let backoff = state
                .entry(worker.to_string())
                .or_insert_with(fresh_backoff);
            backoff.next_backoff().unwrap_or(MAX_PAUSE)
        };

        info!(worker, ?delay, "pausing for worker backoff");
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delays_grow_per_worker() {
        tokio::time::pause();
        let hook = ExponentialPauseHook::new();

        let before = tokio::time::Instant::now();
        hook.on_backoff("alpha").await.unwrap();
        let first = before.elapsed();

        let before = tokio::time::Instant::now();
        hook.on_backoff("alpha").await.unwrap();
        let second = before.elapsed();

        assert!(second >= first);
    }

    #[tokio::test]
    async fn test_workers_are_isolated() {
        tokio::time::pause();
        let hook = ExponentialPauseHook::new();
        for _ in 0..3 {
            hook.on_backoff("alpha").await.unwrap();
        }

        // A different worker starts from the initial interval.
        let before = tokio::time::Instant::now();
        hook.on_backoff("beta").await.unwrap();
        assert!(before.elapsed() < Duration::from_secs(30));
    }
}
