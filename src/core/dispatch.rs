use crate::config::RunConfig;
use crate::domain::model::{Batch, BatchOutcome};
use crate::domain::ports::LookupClient;
use crate::utils::error::ValidatorError;
use futures::future::join_all;
use rand::Rng;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Bounds in-flight lookups with a permit pool and throttles each task.
///
/// A task holds its permit for the call and for the randomized pause that
/// follows it, so at most `concurrency` requests are started per pause window.
pub struct Dispatcher {
    permits: Semaphore,
    concurrency: usize,
    timeout: Duration,
    throttle: (Duration, Duration),
}

impl Dispatcher {
    pub fn new(concurrency: usize, timeout: Duration, throttle: (Duration, Duration)) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Semaphore::new(concurrency),
            concurrency,
            timeout,
            throttle,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.concurrency, config.timeout(), config.throttle_range())
    }

    /// Same timing, one request at a time.
    pub fn serialized(&self) -> Self {
        Self::new(1, self.timeout, self.throttle)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Launches every batch of the round and waits for all of them.
    /// Outcomes are returned in batch order.
    pub async fn run_round<C>(&self, client: &C, batches: &[Batch]) -> Vec<BatchOutcome>
    where
        C: LookupClient + ?Sized,
    {
        join_all(batches.iter().map(|batch| self.dispatch(client, batch))).await
    }

    async fn dispatch<C>(&self, client: &C, batch: &Batch) -> BatchOutcome
    where
        C: LookupClient + ?Sized,
    {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return BatchOutcome::Failed(ValidatorError::DispatchError {
                    message: format!("permit pool unavailable: {}", e),
                })
            }
        };

        tracing::info!("Processing batch: {:?}", batch.numbers());
        let outcome = match tokio::time::timeout(self.timeout, client.lookup(batch)).await {
            Ok(Ok(results)) => BatchOutcome::from_results(results),
            Ok(Err(e)) => BatchOutcome::Failed(e),
            Err(_) => BatchOutcome::Failed(ValidatorError::TimeoutError {
                seconds: self.timeout.as_secs(),
            }),
        };

        match &outcome {
            BatchOutcome::Answered(results) => {
                tracing::debug!("Batch answered with {} results", results.len());
            }
            BatchOutcome::Empty => {
                tracing::warn!("⚠️ No results for batch: {:?}", batch.numbers());
            }
            BatchOutcome::Failed(e) => {
                tracing::warn!(
                    retryable = e.is_retryable(),
                    "❌ Error on batch {:?}: {}",
                    batch.numbers(),
                    e
                );
            }
        }

        let pause = self.throttle_pause();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        outcome
    }

    fn throttle_pause(&self) -> Duration {
        let (min, max) = self.throttle;
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}
