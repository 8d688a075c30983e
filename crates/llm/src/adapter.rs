//! Generation adapter.
//!
//! The only way the rest of Veritas talks to a generation backend. It owns the
//! bounded access pool, the per-attempt timeout and the fallback chain of
//! invocation strategies.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, warn};
use veritas_core::{AppError, AppResult};

use crate::client::{LlmClient, LlmRequest, LlmResponse};

/// First attempt plus one fallback on timeout.
pub const MAX_ATTEMPTS: usize = 2;

/// Bounded, timeout-guarded front of an ordered list of invocation strategies.
#[derive(Clone)]
pub struct GenerationAdapter {
    chain: Vec<Arc<dyn LlmClient>>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    timeout: Duration,
    warmup_timeout: Duration,
}

impl std::fmt::Debug for GenerationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationAdapter")
            .field("strategies", &self.strategy_labels())
            .field("max_concurrency", &self.max_concurrency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GenerationAdapter {
    /// `max_concurrency` of zero is treated as one.
    pub fn new(chain: Vec<Arc<dyn LlmClient>>, max_concurrency: usize, timeout: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            chain,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            timeout,
            warmup_timeout: timeout,
        }
    }

    pub fn with_warmup_timeout(mut self, warmup_timeout: Duration) -> Self {
        self.warmup_timeout = warmup_timeout;
        self
    }

    /// Default per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn strategy_labels(&self) -> Vec<String> {
        self.chain
            .iter()
            .map(|c| match c.strategy() {
                Some(s) => format!("{}:{}", c.provider_name(), s),
                None => c.provider_name().to_string(),
            })
            .collect()
    }

    /// Generate with the adapter's configured timeout.
    pub async fn generate(&self, prompt: &str, max_answer_tokens: u32) -> AppResult<LlmResponse> {
        self.generate_with_timeout(prompt, max_answer_tokens, self.timeout)
            .await
    }

    /// Generate a completion for `prompt`.
    ///
    /// Waits for a pool slot first; the slot is held across the fallback
    /// attempt. A timed-out attempt is dropped, which terminates its process
    /// or connection, and the next strategy is tried once. Backend errors are
    /// returned as they are.
    pub async fn generate_with_timeout(
        &self,
        prompt: &str,
        max_answer_tokens: u32,
        timeout: Duration,
    ) -> AppResult<LlmResponse> {
        let request = LlmRequest::new(prompt).with_max_tokens(max_answer_tokens);
        self.run(&request, timeout).await
    }

    /// One zero-output call against the first strategy, under the warm-up timeout.
    pub async fn warm_up(&self) -> AppResult<()> {
        let client = self.chain.first().ok_or_else(|| {
            AppError::BackendUnavailable("No generation strategy configured".to_string())
        })?;
        let _permit = self.acquire().await?;

        info!(
            provider = client.provider_name(),
            timeout_secs = self.warmup_timeout.as_secs(),
            "Warming up generation backend"
        );

        match tokio::time::timeout(self.warmup_timeout, client.warm_up()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::GenerationTimeout {
                attempts: 1,
                timeout_secs: self.warmup_timeout.as_secs(),
            }),
        }
    }

    async fn acquire(&self) -> AppResult<tokio::sync::SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| AppError::BackendUnavailable("Generation pool is closed".to_string()))
    }

    async fn run(&self, request: &LlmRequest, timeout: Duration) -> AppResult<LlmResponse> {
        if self.chain.is_empty() {
            return Err(AppError::BackendUnavailable(
                "No generation strategy configured".to_string(),
            ));
        }

        let _permit = self.acquire().await?;
        let mut attempts = 0;

        for client in self.chain.iter().take(MAX_ATTEMPTS) {
            attempts += 1;
            let strategy = client.strategy().unwrap_or("default");

            info!(
                provider = client.provider_name(),
                strategy,
                attempt = attempts,
                max_tokens = request.max_tokens,
                "Generating"
            );

            match tokio::time::timeout(timeout, client.complete(request)).await {
                Ok(result) => return result,
                Err(_) => {
                    warn!(
                        provider = client.provider_name(),
                        strategy,
                        timeout_secs = timeout.as_secs_f32(),
                        "Generation timed out, trying next strategy"
                    );
                }
            }
        }

        Err(AppError::GenerationTimeout {
            attempts,
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmUsage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Reply(&'static str),
        Hang,
        Fail,
    }

    struct MockClient {
        label: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl MockClient {
        fn new(label: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                label,
                behaviour,
                calls: AtomicUsize::new(0),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for MockClient {
        fn provider_name(&self) -> &str {
            "mock"
        }

        fn strategy(&self) -> Option<&str> {
            Some(self.label)
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let result = match self.behaviour {
                Behaviour::Reply(text) => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(LlmResponse {
                        content: format!("{} ({} tokens)", text, request.max_tokens),
                        provider: "mock".to_string(),
                        strategy: Some(self.label.to_string()),
                        usage: LlmUsage::default(),
                    })
                }
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(AppError::Other("unreachable".to_string()))
                }
                Behaviour::Fail => Err(AppError::GenerationFailed("bad flags".to_string())),
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn adapter(chain: Vec<Arc<MockClient>>, timeout_ms: u64) -> GenerationAdapter {
        let chain = chain
            .into_iter()
            .map(|c| c as Arc<dyn LlmClient>)
            .collect();
        GenerationAdapter::new(chain, 1, Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn test_first_strategy_success() {
        let first = MockClient::new("a", Behaviour::Reply("ok"));
        let second = MockClient::new("b", Behaviour::Reply("unused"));
        let adapter = adapter(vec![first.clone(), second.clone()], 1000);

        let response = adapter.generate("prompt", 128).await.unwrap();
        assert_eq!(response.content, "ok (128 tokens)");
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_once() {
        let first = MockClient::new("a", Behaviour::Hang);
        let second = MockClient::new("b", Behaviour::Reply("fallback"));
        let adapter = adapter(vec![first.clone(), second.clone()], 100);

        let response = adapter.generate("prompt", 64).await.unwrap();
        assert_eq!(response.strategy.as_deref(), Some("b"));
        assert_eq!(first.calls(), 1);
    }

    #[tokio::test]
    async fn test_two_timeouts_surface_generation_timeout() {
        let a = MockClient::new("a", Behaviour::Hang);
        let b = MockClient::new("b", Behaviour::Hang);
        let c = MockClient::new("c", Behaviour::Reply("never tried"));
        let adapter = adapter(vec![a, b, c.clone()], 50);

        let err = adapter.generate("prompt", 64).await.unwrap_err();
        match err {
            AppError::GenerationTimeout { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_explicit_timeout_overrides_default() {
        let client = MockClient::new("a", Behaviour::Reply("slow"));
        let adapter = adapter(vec![client.clone()], 1);

        let err = adapter.generate("prompt", 64).await.unwrap_err();
        assert_eq!(err.kind(), "generation_timeout");

        let response = adapter
            .generate_with_timeout("prompt", 64, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.content, "slow (64 tokens)");
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_explicit_timeout_bounds_hanging_backend() {
        let a = MockClient::new("a", Behaviour::Hang);
        let b = MockClient::new("b", Behaviour::Hang);
        let adapter = adapter(vec![a.clone(), b.clone()], 60_000);

        let start = std::time::Instant::now();
        let err = adapter
            .generate_with_timeout("prompt", 64, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "generation_timeout");
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!((a.calls(), b.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let first = MockClient::new("a", Behaviour::Fail);
        let second = MockClient::new("b", Behaviour::Reply("unused"));
        let adapter = adapter(vec![first, second.clone()], 1000);

        let err = adapter.generate("prompt", 64).await.unwrap_err();
        assert_eq!(err.kind(), "generation_failed");
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_chain_is_backend_unavailable() {
        let adapter = GenerationAdapter::new(Vec::new(), 1, Duration::from_secs(1));
        let err = adapter.generate("prompt", 64).await.unwrap_err();
        assert_eq!(err.kind(), "backend_unavailable");
        assert_eq!(adapter.warm_up().await.unwrap_err().kind(), "backend_unavailable");
    }

    #[tokio::test]
    async fn test_pool_serializes_generations() {
        let client = MockClient::new("a", Behaviour::Reply("ok"));
        let adapter = adapter(vec![client.clone()], 1000);

        let (a, b, c) = tokio::join!(
            adapter.generate("one", 64),
            adapter.generate("two", 64),
            adapter.generate("three", 64)
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(client.calls(), 3);
        assert_eq!(client.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_warm_up_sends_zero_tokens() {
        let client = MockClient::new("a", Behaviour::Reply("ready"));
        let adapter = adapter(vec![client.clone()], 1000)
            .with_warmup_timeout(Duration::from_secs(5));
        adapter.warm_up().await.unwrap();
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_strategy_labels() {
        let adapter = adapter(
            vec![
                MockClient::new("promptFlag", Behaviour::Fail),
                MockClient::new("positional", Behaviour::Fail),
            ],
            10,
        );
        assert_eq!(
            adapter.strategy_labels(),
            vec!["mock:promptFlag", "mock:positional"]
        );
    }
}
