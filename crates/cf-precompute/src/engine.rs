use crate::config::PrecomputeConfig;
use crate::config::PRECOMPUTE_NAMESPACE;
use crate::job::highest_priority_index;
use crate::job::lowest_priority_index;
use crate::job::PrecomputeJob;
use crate::predictor::compute_depth;
use crate::predictor::predict_positions;
use crate::predictor::priority_for;
use cf_cache::CacheManager;
use cf_core::Board;
use cf_core::Clock;
use cf_core::ComputeMove;
use cf_core::ComputeOutcome;
use cf_core::Event;
use cf_core::EventBus;
use cf_core::Fingerprint;
use cf_core::PlayerColor;
use cf_core::SystemClock;
use cf_core::WARMUP_ENDGAME_PRIORITY;
use cf_core::WARMUP_OPENING_PRIORITY;
use cf_monitor::Monitor;
use cf_strategy::StrategySelector;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

struct State {
    queue: VecDeque<PrecomputeJob>,
    known: HashSet<(Fingerprint, PlayerColor)>,
}

/// Background predictor-scheduler that fills the cache with likely future
/// positions. Runs its own ~10 Hz dispatcher task; jobs are
/// fire-and-forget, never cancelled once scheduled.
pub struct PrecomputeEngine {
    config: PrecomputeConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    in_flight: AtomicUsize,
    accepting: AtomicBool,
    cache: Arc<CacheManager>,
    compute: Arc<dyn ComputeMove>,
    selector: Arc<StrategySelector>,
    monitor: Option<Arc<Monitor>>,
    events: Option<Arc<EventBus>>,
    dispatcher: Mutex<Option<tokio::task::JoinHandle<()>>>,
    weak_self: std::sync::OnceLock<std::sync::Weak<Self>>,
}

impl PrecomputeEngine {
    pub fn new(
        config: PrecomputeConfig,
        cache: Arc<CacheManager>,
        compute: Arc<dyn ComputeMove>,
        selector: Arc<StrategySelector>,
    ) -> Arc<Self> {
        Self::build(config, Arc::new(SystemClock), cache, compute, selector, None, None)
    }

    pub fn with_observability(
        config: PrecomputeConfig,
        cache: Arc<CacheManager>,
        compute: Arc<dyn ComputeMove>,
        selector: Arc<StrategySelector>,
        monitor: Arc<Monitor>,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        Self::build(config, Arc::new(SystemClock), cache, compute, selector, Some(monitor), Some(events))
    }

    fn build(
        config: PrecomputeConfig,
        clock: Arc<dyn Clock>,
        cache: Arc<CacheManager>,
        compute: Arc<dyn ComputeMove>,
        selector: Arc<StrategySelector>,
        monitor: Option<Arc<Monitor>>,
        events: Option<Arc<EventBus>>,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            config,
            clock,
            state: Mutex::new(State { queue: VecDeque::new(), known: HashSet::new() }),
            in_flight: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            cache,
            compute,
            selector,
            monitor,
            events,
            dispatcher: Mutex::new(None),
            weak_self: std::sync::OnceLock::new(),
        });
        let _ = engine.weak_self.set(Arc::downgrade(&engine));
        let handle = engine.clone().spawn_dispatcher();
        *engine.dispatcher.lock().expect("dispatcher handle lock poisoned") = Some(handle);
        engine
    }

    /// Re-acquires an owning `Arc<Self>` for tasks that need to outlive the
    /// current call (the struct is always constructed behind an `Arc`).
    fn arc_self(&self) -> Option<Arc<Self>> {
        self.weak_self.get().and_then(std::sync::Weak::upgrade)
    }

    fn spawn_dispatcher(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(self.config.dispatch_interval_ms));
            loop {
                interval.tick().await;
                if Arc::strong_count(&self) == 1 {
                    return;
                }
                self.dispatch_tick();
            }
        })
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Schedules `board`/`player` at `depth`/`priority` if it isn't already
    /// queued or in flight. Returns whether it was newly scheduled.
    fn schedule(&self, board: Board, player: PlayerColor, depth: u8, priority: f32, derived_probability: f32) -> bool {
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        let fingerprint = board.fingerprint(player);
        let key = (fingerprint.clone(), player);
        let queued_at_ms = self.clock.now_millis();
        let mut state = self.state.lock().expect("precompute state lock poisoned");
        if state.known.contains(&key) {
            return false;
        }
        if state.queue.len() >= self.config.queue_cap {
            match lowest_priority_index(&state.queue) {
                Some(idx) if state.queue[idx].priority < priority => {
                    let evicted = state.queue.remove(idx).expect("index came from the same queue");
                    state.known.remove(&(evicted.fingerprint, evicted.player));
                }
                _ => return false,
            }
        }
        state.known.insert(key);
        state.queue.push_back(PrecomputeJob { board, player, depth, priority, derived_probability, fingerprint, queued_at_ms });
        true
    }

    /// Enumerates likely next positions from `(board, player)` and schedules
    /// each as a precompute job. Best-effort: the caller should spawn this
    /// rather than await it on the request's own critical path.
    pub fn predict_and_precompute(&self, board: &Board, player: PlayerColor, lookahead: u8) {
        for predicted in predict_positions(board, player, lookahead) {
            let depth = compute_depth(predicted.move_number);
            let priority = priority_for(predicted.probability);
            let fingerprint = predicted.board.fingerprint(predicted.player);
            if self.schedule(predicted.board, predicted.player, depth, priority, predicted.probability) {
                self.publish(Event::PrecomputeScheduled { fingerprint, priority });
            }
        }
    }

    /// Schedules canonical opening positions and a small library of
    /// endgame patterns at startup.
    pub fn warmup(&self) {
        let center = cf_core::COLS / 2;
        let mut opening = Board::empty();
        for &(col, player) in &[(center, PlayerColor::Red), (center, PlayerColor::Yellow), (center - 1, PlayerColor::Red)] {
            opening = match opening.drop_piece(col, player) {
                Ok(next) => next,
                Err(_) => continue,
            };
            self.schedule(opening.clone(), player.opponent(), compute_depth(opening.move_number()), WARMUP_OPENING_PRIORITY, 1.0);
        }

        let mut endgame_rows = [[cf_core::Cell::Empty; cf_core::COLS]; cf_core::ROWS];
        for col in 0..cf_core::COLS {
            for row in (cf_core::ROWS - 3)..cf_core::ROWS {
                endgame_rows[row][col] = if (row + col) % 2 == 0 { cf_core::Cell::Red } else { cf_core::Cell::Yellow };
            }
        }
        let endgame = Board::from_rows(endgame_rows);
        if endgame.respects_gravity() && !endgame.is_full() {
            self.schedule(endgame.clone(), PlayerColor::Red, compute_depth(endgame.move_number()), WARMUP_ENDGAME_PRIORITY, 1.0);
        }
    }

    fn dispatch_tick(&self) {
        let Some(this_arc) = self.arc_self() else { return };
        let mut dispatched = 0usize;
        while dispatched < self.config.batch_size {
            if self.in_flight.load(Ordering::SeqCst) >= self.config.max_concurrent {
                return;
            }
            let job = {
                let mut state = self.state.lock().expect("precompute state lock poisoned");
                match highest_priority_index(&state.queue) {
                    Some(idx) => state.queue.remove(idx),
                    None => None,
                }
            };
            let Some(job) = job else { return };
            dispatched += 1;
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let engine = this_arc.clone();
            tokio::spawn(async move { engine.execute(job).await });
        }
    }

    async fn execute(&self, job: PrecomputeJob) {
        let started = self.clock.now_millis();
        let difficulty = ((job.depth as u16) * 3).min(cf_core::MAX_DIFFICULTY as u16) as u8;
        let deadline_ms = started + self.config.compute_deadline_ms;
        let outcome = match self.selector.select(&job.board, job.player, difficulty, None, None) {
            Ok(selection) => self.compute.compute_move(&job.board, job.player, selection.primary, deadline_ms).await.map(|outcome| (selection.primary, outcome)),
            Err(err) => Err(err),
        };

        match outcome {
            Ok((strategy, outcome)) => {
                let bytes = estimate_bytes(&outcome) as u64;
                self.cache.set(PRECOMPUTE_NAMESPACE, job.fingerprint.as_str(), (strategy, outcome), Some(self.config.cache_ttl_ms), bytes);
            }
            Err(err) => log::debug!("[precompute] job for {} failed: {err}", job.fingerprint),
        }

        let millis = (self.clock.now_millis() - started).max(0) as u64;
        self.publish(Event::PrecomputeCompleted { fingerprint: job.fingerprint.clone(), millis });
        if let Some(monitor) = &self.monitor {
            monitor.record_metric("precompute.job_millis", millis as f64, "ms", vec![]);
        }

        self.state.lock().expect("precompute state lock poisoned").known.remove(&(job.fingerprint, job.player));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.state.lock().expect("precompute state lock poisoned").queue.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Drops every queued-but-not-yet-dispatched job (used when the caller
    /// is shedding load under resource pressure); jobs already in flight
    /// are left to finish. Returns the number of jobs dropped.
    pub fn clear_pending(&self) -> usize {
        let mut state = self.state.lock().expect("precompute state lock poisoned");
        let dropped = state.queue.len();
        let jobs: Vec<_> = state.queue.drain(..).collect();
        for job in jobs {
            state.known.remove(&(job.fingerprint, job.player));
        }
        dropped
    }

    /// Graceful shutdown: stop accepting new jobs and wait for the queue to
    /// drain and all in-flight jobs to finish.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        while self.pending() > 0 || self.in_flight_count() > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.dispatch_interval_ms)).await;
        }
    }
}

impl Drop for PrecomputeEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.lock().expect("dispatcher handle lock poisoned").take() {
            handle.abort();
        }
    }
}

fn estimate_bytes(outcome: &ComputeOutcome) -> usize {
    std::mem::size_of::<ComputeOutcome>() + outcome.alternatives.len() * 64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cf_cache::CacheConfig;
    use cf_core::Alternative;
    use cf_core::CoreError;
    use cf_core::StrategyTag;
    use cf_strategy::SelectorConfig;
    use std::sync::atomic::AtomicU32;

    struct StubCompute {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ComputeMove for StubCompute {
        async fn compute_move(&self, _board: &Board, _player: PlayerColor, strategy: StrategyTag, _deadline_ms: i64) -> Result<ComputeOutcome, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ComputeOutcome { column: 3, score: 0.5, confidence: 0.5, alternatives: vec![Alternative { column: 3, score: 0.5, reasoning: strategy.label().to_string() }] })
        }
    }

    fn engine() -> (Arc<PrecomputeEngine>, Arc<CacheManager>) {
        let cache = Arc::new(CacheManager::new(CacheConfig::default()));
        let compute = Arc::new(StubCompute { calls: AtomicU32::new(0) });
        let selector = Arc::new(StrategySelector::new(SelectorConfig::default()));
        let engine = PrecomputeEngine::new(PrecomputeConfig::default(), cache.clone(), compute, selector);
        (engine, cache)
    }

    #[tokio::test]
    async fn scheduling_the_same_position_twice_is_deduplicated() {
        let (engine, _cache) = engine();
        let board = Board::empty();
        assert!(engine.schedule(board.clone(), PlayerColor::Red, 4, 5.0, 0.5));
        assert!(!engine.schedule(board, PlayerColor::Red, 4, 5.0, 0.5));
        assert_eq!(engine.pending(), 1);
    }

    #[tokio::test]
    async fn predict_and_precompute_eventually_populates_the_cache() {
        let (engine, cache) = engine();
        let board = Board::empty();
        engine.predict_and_precompute(&board, PlayerColor::Red, 1);
        assert!(engine.pending() > 0);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            if engine.pending() == 0 && engine.in_flight_count() == 0 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "jobs never drained");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let fp = Board::empty().drop_piece(cf_core::COLS / 2, PlayerColor::Red).unwrap().fingerprint(PlayerColor::Yellow);
        let cached: Option<(StrategyTag, ComputeOutcome)> = cache.get(PRECOMPUTE_NAMESPACE, fp.as_str());
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn graceful_shutdown_stops_accepting_new_jobs() {
        let (engine, _cache) = engine();
        engine.shutdown().await;
        let board = Board::empty();
        assert!(!engine.schedule(board, PlayerColor::Red, 4, 5.0, 0.5));
    }

    #[tokio::test]
    async fn overflow_drops_the_lower_priority_job() {
        let config = PrecomputeConfig { queue_cap: 1, max_concurrent: 0, ..PrecomputeConfig::default() };
        let cache = Arc::new(CacheManager::new(CacheConfig::default()));
        let compute = Arc::new(StubCompute { calls: AtomicU32::new(0) });
        let selector = Arc::new(StrategySelector::new(SelectorConfig::default()));
        let engine = PrecomputeEngine::new(config, cache, compute, selector);

        let low = Board::empty().drop_piece(0, PlayerColor::Red).unwrap();
        let high = Board::empty().drop_piece(1, PlayerColor::Red).unwrap();
        assert!(engine.schedule(low, PlayerColor::Yellow, 4, 1.0, 0.1));
        assert!(engine.schedule(high, PlayerColor::Yellow, 4, 9.0, 0.9));
        assert_eq!(engine.pending(), 1);
    }
}
