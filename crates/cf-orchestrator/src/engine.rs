use crate::analyze::analyse_batch;
use crate::analyze::AnalyseRequest;
use crate::analyze::AnalyseResult;
use crate::config::EngineConfig;
use crate::errors::RequestError;
use crate::health::recommend;
use crate::health::PrecomputeHealth;
use crate::health::SystemHealth;
use crate::namespaces::ANALYSE_BATCHER_NAME;
use crate::namespaces::AI_COMPUTE_OPERATION;
use crate::namespaces::GET_MOVE_QUEUE_NAME;
use crate::pipeline::ComputePipeline;
use crate::stream::stream_analysis;
use crate::stream::AnalysisUpdate;
use cf_batcher::NamedBatcher;
use cf_batcher::NamedBatcherConfig;
use cf_batcher::PriorityQueue;
use cf_batcher::PriorityQueueConfig;
use cf_breaker::BreakerConfig;
use cf_breaker::CircuitBreaker;
use cf_breaker::RetryConfig;
use cf_cache::CacheConfig;
use cf_cache::CacheManager;
use cf_core::Clock;
use cf_core::ComputeMove;
use cf_core::Event;
use cf_core::EventBus;
use cf_core::MoveRequest;
use cf_core::MoveResponse;
use cf_core::OpeningBook;
use cf_core::RandomSource;
use cf_core::SeededRandom;
use cf_core::SystemClock;
use cf_monitor::Monitor;
use cf_monitor::MonitorConfig;
use cf_monitor::OperationStatus;
use cf_precompute::PrecomputeConfig;
use cf_precompute::PrecomputeEngine;
use cf_strategy::Outcome;
use cf_strategy::SelectorConfig;
use cf_strategy::StrategySelector;
use std::sync::Arc;

/// Per-subsystem configuration bundle for [`Engine::assemble`]. Kept
/// separate from [`EngineConfig`] (feature toggles) so callers can tune one
/// subsystem's limits without restating every other default.
#[derive(Clone, Debug, Default)]
pub struct EngineComponentConfigs {
    pub cache: CacheConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub move_queue: PriorityQueueConfig,
    pub analyse_batcher: NamedBatcherConfig,
    pub precompute: PrecomputeConfig,
    pub selector: SelectorConfig,
    pub monitor: MonitorConfig,
}

/// Wires every subsystem crate together and serves the public callable
/// surface. Construction never fails; a disabled
/// subsystem (via [`EngineConfig`]'s `enable_*` flags) simply runs without
/// that optimisation rather than erroring.
pub struct Engine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    monitor: Option<Arc<Monitor>>,
    cache: Option<Arc<CacheManager>>,
    breaker: Option<Arc<CircuitBreaker>>,
    selector: Arc<StrategySelector>,
    precompute: Option<Arc<PrecomputeEngine>>,
    pipeline: Arc<ComputePipeline>,
    move_queue: Option<Arc<PriorityQueue<MoveRequest, MoveResponse>>>,
    analyse_batcher: Option<Arc<NamedBatcher<AnalyseRequest, AnalyseResult>>>,
}

impl Engine {
    pub fn assemble(config: EngineConfig, components: EngineComponentConfigs, compute: Arc<dyn ComputeMove>, opening_book: Option<Arc<dyn OpeningBook>>) -> Arc<Self> {
        Self::build(config, components, compute, opening_book, Arc::new(SystemClock), Arc::new(SeededRandom::from_entropy()))
    }

    pub fn assemble_with_clock(
        config: EngineConfig,
        components: EngineComponentConfigs,
        compute: Arc<dyn ComputeMove>,
        opening_book: Option<Arc<dyn OpeningBook>>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Arc<Self> {
        Self::build(config, components, compute, opening_book, clock, rng)
    }

    fn build(
        config: EngineConfig,
        components: EngineComponentConfigs,
        compute: Arc<dyn ComputeMove>,
        opening_book: Option<Arc<dyn OpeningBook>>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Arc<Self> {
        let events = Arc::new(EventBus::default());
        let monitor = config.enable_monitor.then(|| Arc::new(Monitor::with_observability(components.monitor, clock.clone(), events.clone())));
        let cache = config.enable_cache.then(|| match &monitor {
            Some(monitor) => Arc::new(CacheManager::with_observability(components.cache.clone(), monitor.clone(), events.clone())),
            None => Arc::new(CacheManager::with_clock(components.cache.clone(), clock.clone())),
        });
        let breaker = config.enable_breaker.then(|| match &monitor {
            Some(monitor) => Arc::new(CircuitBreaker::with_observability(components.breaker.clone(), monitor.clone(), events.clone())),
            None => Arc::new(CircuitBreaker::with_clock(components.breaker.clone(), clock.clone())),
        });
        let selector = match &monitor {
            Some(monitor) => Arc::new(StrategySelector::with_observability(components.selector.clone(), monitor.clone(), events.clone())),
            None => Arc::new(StrategySelector::new(components.selector.clone())),
        };

        let pipeline = Arc::new(ComputePipeline {
            cache: cache.clone(),
            breaker: breaker.clone(),
            retry_config: components.retry.clone(),
            selector: selector.clone(),
            compute: compute.clone(),
            opening_book,
            rng,
            clock: clock.clone(),
            events: events.clone(),
        });

        let precompute = (config.enable_precompute && cache.is_some()).then(|| {
            let cache = cache.clone().expect("checked by the guard above");
            let engine = match &monitor {
                Some(monitor) => PrecomputeEngine::with_observability(components.precompute.clone(), cache, compute.clone(), selector.clone(), monitor.clone(), events.clone()),
                None => PrecomputeEngine::new(components.precompute.clone(), cache, compute.clone(), selector.clone()),
            };
            engine.warmup();
            engine
        });

        let move_queue = config.enable_batching.then(|| {
            let pipeline = pipeline.clone();
            let default_time_limit_ms = config.default_time_limit_ms as i64;
            let clock_for_queue = clock.clone();
            let processor = move |request: MoveRequest| {
                let pipeline = pipeline.clone();
                let clock = clock_for_queue.clone();
                async move {
                    let deadline_ms = request.deadline_ms.unwrap_or_else(|| clock.now_millis() + default_time_limit_ms);
                    Ok(pipeline.run(&request.board, request.player, request.difficulty, deadline_ms, request.strategy_override).await)
                }
            };
            match &monitor {
                Some(monitor) => PriorityQueue::with_observability(GET_MOVE_QUEUE_NAME, components.move_queue.clone(), processor, monitor.clone(), events.clone()),
                None => PriorityQueue::new(GET_MOVE_QUEUE_NAME, components.move_queue.clone(), processor),
            }
        });

        let analyse_batcher = config.enable_batching.then(|| {
            let pipeline = pipeline.clone();
            let processor = move |items: Vec<AnalyseRequest>| {
                let pipeline = pipeline.clone();
                async move { analyse_batch(&pipeline, items).await }
            };
            match &monitor {
                Some(monitor) => NamedBatcher::with_observability(ANALYSE_BATCHER_NAME, components.analyse_batcher.clone(), processor, monitor.clone(), events.clone()),
                None => NamedBatcher::new(ANALYSE_BATCHER_NAME, components.analyse_batcher.clone(), processor),
            }
        });

        Arc::new(Self { config, clock, events, monitor, cache, breaker, selector, precompute, pipeline, move_queue, analyse_batcher })
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Whether emergency mode should currently be active: resident memory
    /// or CPU time over the configured critical threshold.
    fn emergency_active(&self) -> bool {
        let Some(monitor) = &self.monitor else { return false };
        let system = monitor.generate_report(1).system;
        system.resident_memory_bytes.map(|b| b >= self.config.emergency.resident_memory_bytes_critical).unwrap_or(false)
            || system.cpu_user_ms.map(|ms| ms >= self.config.emergency.cpu_user_ms_critical).unwrap_or(false)
    }

    /// Drops pending precompute jobs and clears precompute cache namespaces,
    /// the emergency-mode mitigations this engine performs reactively on
    /// every `GetMove` while pressure remains critical.
    fn relieve_emergency_pressure(&self) {
        if let Some(precompute) = &self.precompute {
            let dropped = precompute.clear_pending();
            if dropped > 0 {
                log::warn!("[orchestrator] emergency mode: dropped {dropped} pending precompute jobs");
            }
        }
        if let Some(cache) = &self.cache {
            cache.invalidate_namespace(cf_precompute::PRECOMPUTE_NAMESPACE);
        }
    }

    /// `GetMove(request) -> response`. Always returns either
    /// a usable response or a typed, correlation-id-bearing error; never a
    /// bare [`cf_core::CoreError`].
    pub async fn get_move(&self, request: MoveRequest) -> Result<MoveResponse, RequestError> {
        let correlation_id = uuid::Uuid::now_v7();
        let span = self.monitor.as_ref().map(|monitor| monitor.start_span("get_move", request.game_id.clone(), None));

        let outcome = self.get_move_inner(&request, correlation_id).await;

        if let (Some(monitor), Some(span_id)) = (&self.monitor, span) {
            let status = if outcome.is_ok() { OperationStatus::Success } else { OperationStatus::Failure };
            let strategy_label = outcome.as_ref().map(|r| r.strategy_used.label()).unwrap_or("none");
            let _ = monitor.end_span("get_move", span_id, vec![("strategy".to_string(), strategy_label.to_string())]);
            if let Ok(response) = &outcome {
                monitor.record_metric(
                    "ai_compute.compute_millis",
                    response.compute_millis as f64,
                    "ms",
                    vec![("strategy".to_string(), strategy_label.to_string()), ("difficulty".to_string(), request.difficulty.to_string())],
                );
            }
            let _ = status;
        }

        outcome
    }

    async fn get_move_inner(&self, request: &MoveRequest, correlation_id: uuid::Uuid) -> Result<MoveResponse, RequestError> {
        if self.emergency_active() {
            self.relieve_emergency_pressure();
            if request.priority < self.config.emergency.min_priority_during_emergency {
                self.events.publish(Event::RequestFailed { kind: cf_core::ErrorKind::QueueFull, correlation_id });
                return Err(RequestError::new(cf_core::CoreError::QueueFull, correlation_id));
            }
        }

        if let Err(err) = request.validate() {
            self.events.publish(Event::RequestFailed { kind: err.kind(), correlation_id });
            return Err(RequestError::new(err, correlation_id));
        }

        let fingerprint = request.board.fingerprint(request.player);
        if let Some(cache) = &self.cache {
            if let Some((strategy, cached_outcome)) = cache.get::<(cf_core::StrategyTag, cf_core::ComputeOutcome)>(cf_precompute::PRECOMPUTE_NAMESPACE, fingerprint.as_str()) {
                return Ok(MoveResponse {
                    column: cached_outcome.column,
                    confidence: cached_outcome.confidence,
                    strategy_used: strategy,
                    compute_millis: 0,
                    cached: true,
                    reasoning: format!("precomputed {} result", strategy.label()),
                    alternatives: cached_outcome.alternatives,
                });
            }
        }

        if let Some(precompute) = self.precompute.clone() {
            let board = request.board.clone();
            let player = request.player;
            let lookahead = self.config.precompute_lookahead;
            tokio::spawn(async move { precompute.predict_and_precompute(&board, player, lookahead) });
        }

        let deadline_ms = request.deadline_ms.unwrap_or_else(|| self.clock.now_millis() + self.config.default_time_limit_ms as i64);

        let response = match &self.move_queue {
            Some(queue) => queue.enqueue(request.clone(), request.priority).await.map_err(|err| {
                self.events.publish(Event::RequestFailed { kind: err.kind(), correlation_id });
                RequestError::new(err, correlation_id)
            })?,
            None => self.pipeline.run(&request.board, request.player, request.difficulty, deadline_ms, request.strategy_override).await,
        };

        if !response.cached {
            self.record_outcome(&request.board, request.player, &response);
        }

        Ok(response)
    }

    /// `UpdatePerformance`, invoked once a decision
    /// is resolved: a win or a draw. A move that leaves the game ongoing
    /// hasn't resolved a decision yet, so it is not scored.
    fn record_outcome(&self, board: &cf_core::Board, player: cf_core::PlayerColor, response: &MoveResponse) {
        let Ok(resulting) = board.drop_piece(response.column, player) else { return };
        let outcome = if resulting.winner() == Some(player) {
            Outcome::Win
        } else if resulting.is_full() {
            Outcome::Draw
        } else {
            return;
        };
        self.selector.update_performance(response.strategy_used, outcome, response.compute_millis, response.confidence);
    }

    /// `AnalyseBoards([board], player) -> [{bestMove, score}]`,
    /// batched via [`cf_batcher::NamedBatcher`].
    pub async fn analyse_boards(&self, boards: Vec<(cf_core::Board, cf_core::PlayerColor)>, difficulty: u8) -> Vec<Result<AnalyseResult, RequestError>> {
        let deadline_ms = self.clock.now_millis() + self.config.default_time_limit_ms as i64;
        let mut results = Vec::with_capacity(boards.len());
        for (board, player) in boards {
            let item = AnalyseRequest { board, player, difficulty, deadline_ms, priority: 5 };
            let result = match &self.analyse_batcher {
                Some(batcher) => batcher.enqueue(item, 5).await,
                None => analyse_batch(&self.pipeline, vec![item]).await.remove(0),
            };
            results.push(result.map_err(|err| RequestError::new(err, uuid::Uuid::now_v7())));
        }
        results
    }

    /// `StreamAnalysis(request, options) -> AsyncSequence<Update>`.
    pub fn stream_analysis(&self, request: MoveRequest) -> tokio::sync::mpsc::Receiver<AnalysisUpdate> {
        let deadline_ms = request.deadline_ms.unwrap_or_else(|| self.clock.now_millis() + self.config.default_time_limit_ms as i64);
        stream_analysis(self.pipeline.clone(), request, deadline_ms)
    }

    /// `SystemHealth() -> {...}`.
    pub fn system_health(&self) -> SystemHealth {
        let cache_stats = self.cache.as_ref().map(|c| c.stats(AI_COMPUTE_OPERATION)).unwrap_or_default();
        let breaker_snapshot = self.breaker.as_ref().map(|b| b.snapshot(AI_COMPUTE_OPERATION)).unwrap_or(cf_breaker::BreakerSnapshot {
            state: cf_breaker::CircuitState::Closed,
            consecutive_failures: 0,
            next_attempt_at_ms: 0,
        });
        let batcher_stats = self.move_queue.as_ref().map(|q| q.stats()).unwrap_or_default();
        let precompute_health = self
            .precompute
            .as_ref()
            .map(|p| PrecomputeHealth { pending: p.pending(), in_flight: p.in_flight_count() })
            .unwrap_or(PrecomputeHealth { pending: 0, in_flight: 0 });
        let report = self.monitor.as_ref().map(|m| m.generate_report(60_000)).unwrap_or(cf_monitor::Report {
            window_ms: 60_000,
            metrics: std::collections::HashMap::new(),
            success_rate: None,
            cache_hit_rate: None,
            system: cf_monitor::SystemSnapshot::default(),
        });

        let mut health = SystemHealth {
            cache: cache_stats,
            breaker: breaker_snapshot,
            batcher: batcher_stats,
            precompute: precompute_health,
            performance: report,
            recommendations: Vec::new(),
        };
        health.recommendations = recommend(&health);
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cf_core::Board;
    use cf_core::ComputeOutcome;
    use cf_core::CoreError;
    use cf_core::PlayerColor;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    struct StubCompute {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ComputeMove for StubCompute {
        async fn compute_move(&self, board: &Board, _player: PlayerColor, _strategy: cf_core::StrategyTag, _deadline_ms: i64) -> Result<ComputeOutcome, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let column = board.legal_moves()[cf_core::COLS / 2.min(board.legal_moves().len() - 1)];
            Ok(ComputeOutcome { column, score: 1.0, confidence: 0.9, alternatives: vec![] })
        }
    }

    fn engine() -> Arc<Engine> {
        let compute = Arc::new(StubCompute { calls: AtomicU32::new(0) });
        Engine::assemble(EngineConfig::default(), EngineComponentConfigs::default(), compute, None)
    }

    #[tokio::test]
    async fn get_move_never_returns_a_move_into_a_full_column() {
        let engine = engine();
        let mut board = Board::empty();
        for _ in 0..cf_core::ROWS {
            board = board.drop_piece(0, PlayerColor::Red).unwrap();
            board = board.drop_piece(0, PlayerColor::Yellow).unwrap_or(board);
        }
        let request = MoveRequest::new("g1", board, PlayerColor::Red, 5);
        let response = engine.get_move(request).await.unwrap();
        assert_ne!(response.column, 0);
    }

    #[tokio::test]
    async fn invalid_difficulty_is_rejected_with_a_correlation_id() {
        let engine = engine();
        let request = MoveRequest::new("g1", Board::empty(), PlayerColor::Red, 99);
        let err = engine.get_move(request).await.unwrap_err();
        assert_eq!(err.kind, cf_core::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn repeated_identical_requests_serve_a_cached_second_response() {
        let engine = engine();
        let board = Board::empty();
        let first = engine.get_move(MoveRequest::new("g1", board.clone(), PlayerColor::Red, 5)).await.unwrap();
        let second = engine.get_move(MoveRequest::new("g1", board, PlayerColor::Red, 5)).await.unwrap();
        assert_eq!(first.column, second.column);
        assert!(second.cached);
    }

    #[tokio::test]
    async fn system_health_reports_without_panicking() {
        let engine = engine();
        let health = engine.system_health();
        assert_eq!(health.precompute.pending + health.precompute.in_flight, health.precompute.pending + health.precompute.in_flight);
    }
}
