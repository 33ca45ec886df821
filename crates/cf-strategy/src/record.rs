use cf_core::Clock;
use cf_core::StrategyTag;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

/// Outcome of one completed move decision, fed back via `UpdatePerformance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

/// Per-strategy rolling stats.
#[derive(Clone, Copy, Debug)]
pub struct StrategyRecord {
    pub games_played: u64,
    pub wins: u64,
    pub avg_move_ms: f64,
    pub avg_confidence: f32,
    pub last_used_at_ms: i64,
}

impl Default for StrategyRecord {
    fn default() -> Self {
        Self { games_played: 0, wins: 0, avg_move_ms: 0.0, avg_confidence: 0.0, last_used_at_ms: 0 }
    }
}

impl StrategyRecord {
    /// `successRate = wins / max(1, gamesPlayed)`.
    pub fn success_rate(&self) -> f32 {
        self.wins as f32 / self.games_played.max(1) as f32
    }

    fn record(&mut self, outcome: Outcome, move_ms: u64, confidence: f32, now_ms: i64) {
        let n = self.games_played;
        self.avg_move_ms = (self.avg_move_ms * n as f64 + move_ms as f64) / (n + 1) as f64;
        self.avg_confidence = (self.avg_confidence * n as f32 + confidence) / (n + 1) as f32;
        if outcome == Outcome::Win {
            self.wins += 1;
        }
        self.games_played += 1;
        self.last_used_at_ms = now_ms;
    }
}

/// Strategy-performance registry. One `Mutex<StrategyRecord>` per strategy
/// inside a `RwLock<HashMap<..>>`: readers (scoring) take the `RwLock` in
/// read mode and only lock the one strategy's mutex they need, so
/// concurrent updates for different strategies never contend with each
/// other, and concurrent updates for the *same* strategy serialise so the
/// rolling average stays monotone in sample count.
pub(crate) struct PerformanceRegistry {
    records: RwLock<HashMap<StrategyTag, Mutex<StrategyRecord>>>,
    clock: Arc<dyn Clock>,
}

impl PerformanceRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { records: RwLock::new(HashMap::new()), clock }
    }

    pub fn snapshot(&self, strategy: StrategyTag) -> StrategyRecord {
        let records = self.records.read().expect("performance registry lock poisoned");
        match records.get(&strategy) {
            Some(cell) => *cell.lock().expect("strategy record lock poisoned"),
            None => StrategyRecord::default(),
        }
    }

    pub fn update(&self, strategy: StrategyTag, outcome: Outcome, move_ms: u64, confidence: f32) {
        let now = self.clock.now_millis();
        {
            let records = self.records.read().expect("performance registry lock poisoned");
            if let Some(cell) = records.get(&strategy) {
                cell.lock().expect("strategy record lock poisoned").record(outcome, move_ms, confidence, now);
                return;
            }
        }
        let mut records = self.records.write().expect("performance registry lock poisoned");
        let cell = records.entry(strategy).or_insert_with(|| Mutex::new(StrategyRecord::default()));
        cell.lock().expect("strategy record lock poisoned").record(outcome, move_ms, confidence, now);
    }
}
