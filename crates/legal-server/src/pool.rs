//! Bounded execution of blocking generations.
//!
//! Every generation runs on tokio's blocking pool while holding a semaphore
//! permit, so at most `max_concurrent` run at once and the rest queue. Each
//! call gets a `CancellationToken` that fires when:
//! - the deadline elapses (the caller gets [`ServerError::Timeout`])
//! - the handler future is dropped, e.g. on client disconnect
//!
//! The permit moves into the blocking task and is released only when the
//! generator actually returns, so cancelled work still counts against the
//! bound until it stops.

use std::sync::Arc;
use std::time::Duration;

use legal_engine::{CancellationToken, Generation, GenerationParams, TextGenerator};
use tokio::sync::Semaphore;

use crate::error::ServerError;

pub struct GenerationPool {
    generator: Arc<dyn TextGenerator>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    timeout: Option<Duration>,
}

impl GenerationPool {
    /// `max_concurrent` is clamped to at least one.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        max_concurrent: usize,
        timeout: Option<Duration>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            generator,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            timeout,
        }
    }

    /// Run one generation, waiting for a free slot first.
    pub async fn generate(
        &self,
        prompt: String,
        params: GenerationParams,
    ) -> Result<Generation, ServerError> {
        let cancel = CancellationToken::new();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let work = self.run(prompt, params, cancel.clone());
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                cancel.cancel();
                ServerError::Timeout(limit)
            })?,
            None => work.await,
        }
    }

    async fn run(
        &self,
        prompt: String,
        params: GenerationParams,
        cancel: CancellationToken,
    ) -> Result<Generation, ServerError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Internal("generation pool closed".to_string()))?;

        let generator = self.generator.clone();
        let generation = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            generator.generate(&prompt, &params, &cancel)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("generation task failed: {e}")))??;

        Ok(generation)
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Generations currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.available_permits()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legal_engine::GenerationError;
    use legal_runtime::MockGenerator;

    fn pool(mock: MockGenerator, max: usize, timeout: Option<Duration>) -> GenerationPool {
        GenerationPool::new(Arc::new(mock), max, timeout)
    }

    #[tokio::test]
    async fn returns_generation() {
        let pool = pool(MockGenerator::with_reply(" ok"), 1, None);
        let out = pool
            .generate("p".to_string(), GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(out.text, "p ok");
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn generator_errors_propagate() {
        let pool = pool(MockGenerator::failing("boom"), 1, None);
        let err = pool
            .generate("p".to_string(), GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::Generation(GenerationError::Inference(_))
        ));
    }

    #[tokio::test]
    async fn timeout_cancels_and_releases_slot() {
        let pool = pool(
            MockGenerator::new().with_latency(Duration::from_secs(30)),
            1,
            Some(Duration::from_millis(50)),
        );
        let err = pool
            .generate("p".to_string(), GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Timeout(_)));

        // The blocking task observes cancellation and gives the permit back.
        for _ in 0..100 {
            if pool.available_permits() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn dropped_caller_cancels_and_releases_slot() {
        let pool = Arc::new(pool(
            MockGenerator::new().with_latency(Duration::from_secs(30)),
            1,
            None,
        ));

        let caller = {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.generate("p".to_string(), GenerationParams::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.available_permits(), 0);

        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        for _ in 0..100 {
            if pool.available_permits() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let pool = Arc::new(pool(
            MockGenerator::new().with_latency(Duration::from_millis(200)),
            1,
            None,
        ));

        let first = {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.generate("a".to_string(), GenerationParams::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.in_flight(), 1);
        assert_eq!(pool.available_permits(), 0);

        assert!(first.await.unwrap().is_ok());
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let pool = pool(MockGenerator::new(), 0, None);
        assert_eq!(pool.max_concurrent(), 1);
    }
}
