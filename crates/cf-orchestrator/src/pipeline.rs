use crate::fallback::fallback_response;
use crate::namespaces::AI_COMPUTE_OPERATION;
use crate::namespaces::DIRECT_NAMESPACE;
use cf_breaker::retry_with_backoff;
use cf_breaker::CircuitBreaker;
use cf_breaker::RetryConfig;
use cf_cache::CacheManager;
use cf_core::Board;
use cf_core::Clock;
use cf_core::ComputeMove;
use cf_core::ComputeOutcome;
use cf_core::CoreError;
use cf_core::Event;
use cf_core::EventBus;
use cf_core::MoveResponse;
use cf_core::OpeningBook;
use cf_core::PlayerColor;
use cf_core::RandomSource;
use cf_core::StrategyTag;
use cf_strategy::StrategySelector;
use std::sync::Arc;

/// The shared `computeAIMove` pipeline: opening
/// book, strategy selection, breaker-protected compute, and a fallback that
/// always converges to a response rather than surfacing `CircuitOpen` or a
/// retry exhaustion to the caller.
pub(crate) struct ComputePipeline {
    pub(crate) cache: Option<Arc<CacheManager>>,
    pub(crate) breaker: Option<Arc<CircuitBreaker>>,
    pub(crate) retry_config: RetryConfig,
    pub(crate) selector: Arc<StrategySelector>,
    pub(crate) compute: Arc<dyn ComputeMove>,
    pub(crate) opening_book: Option<Arc<dyn OpeningBook>>,
    pub(crate) rng: Arc<dyn RandomSource>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: Arc<EventBus>,
}

#[derive(Clone)]
struct MemoHit {
    strategy: StrategyTag,
    outcome: ComputeOutcome,
}

impl ComputePipeline {
    /// Runs the full compute path for one request and always returns a
    /// usable [`MoveResponse`]; failures are absorbed into the fallback
    /// response rather than propagated.
    pub(crate) async fn run(
        &self,
        board: &Board,
        player: PlayerColor,
        difficulty: u8,
        deadline_ms: i64,
        strategy_override: Option<StrategyTag>,
    ) -> MoveResponse {
        let started = self.clock.now_millis();
        let fingerprint = board.fingerprint(player);

        // The memoise wrapper ensures two identical concurrent requests
        // share one compute; `pre_existing` lets us
        // still report `cached` correctly for the caller that finds it.
        let (hit, cached) = match &self.cache {
            Some(cache) => {
                let pre_existing = cache.get::<MemoHit>(DIRECT_NAMESPACE, fingerprint.as_str()).is_some();
                let board_owned = board.clone();
                let result = cache
                    .memoise(DIRECT_NAMESPACE, fingerprint.as_str(), Some(60_000), 256, || {
                        self.compute_once(&board_owned, player, difficulty, deadline_ms, strategy_override)
                    })
                    .await;
                (result, pre_existing)
            }
            None => (self.compute_once(board, player, difficulty, deadline_ms, strategy_override).await, false),
        };

        let millis = (self.clock.now_millis() - started).max(0) as u64;
        match hit {
            Ok(hit) => MoveResponse {
                column: hit.outcome.column,
                confidence: hit.outcome.confidence,
                strategy_used: hit.strategy,
                compute_millis: millis,
                cached,
                reasoning: format!("{} selected for this position", hit.strategy.label()),
                alternatives: hit.outcome.alternatives.clone(),
            },
            Err(err) => {
                log::warn!("[orchestrator] compute path failed, using fallback: {err}");
                self.events.publish(Event::RequestFailed { kind: err.kind(), correlation_id: uuid::Uuid::now_v7() });
                fallback_response(board, player)
            }
        }
    }

    /// Opening book first, entirely outside the breaker, then the
    /// breaker-protected strategy+compute path.
    async fn compute_once(
        &self,
        board: &Board,
        player: PlayerColor,
        difficulty: u8,
        deadline_ms: i64,
        strategy_override: Option<StrategyTag>,
    ) -> Result<MemoHit, CoreError> {
        if strategy_override.is_none() {
            if let Some(book) = &self.opening_book {
                if let Some(column) = book.lookup(board).await {
                    return Ok(MemoHit {
                        strategy: StrategyTag::OpeningBook,
                        outcome: ComputeOutcome { column, score: 1.0, confidence: 0.95, alternatives: Vec::new() },
                    });
                }
            }
        }

        let selection = self.selector.select(board, player, difficulty, None, strategy_override)?;
        let strategy = selection.primary;
        let operation_fn = || async move {
            retry_with_backoff(
                &self.retry_config,
                self.rng.as_ref(),
                |err: &CoreError| err.retryable_by_default(),
                |_attempt| {
                    let board = board.clone();
                    async move { self.compute.compute_move(&board, player, strategy, deadline_ms).await }
                },
            )
            .await
        };

        let outcome = match &self.breaker {
            Some(breaker) => breaker.call(AI_COMPUTE_OPERATION, None::<fn() -> ComputeOutcome>, operation_fn).await?,
            None => operation_fn().await?,
        };

        Ok(MemoHit { strategy, outcome })
    }
}
