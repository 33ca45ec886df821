use crate::board::Board;
use crate::board::PlayerColor;
use crate::error::CoreError;
use crate::request::Alternative;
use crate::request::StrategyTag;

/// Result of one `ComputeMove` invocation.
#[derive(Clone, Debug)]
pub struct ComputeOutcome {
    pub column: usize,
    pub score: f32,
    pub confidence: f32,
    pub alternatives: Vec<Alternative>,
}

/// The core-out capability that actually computes a move. Everything the
/// core does — strategy selection, caching, circuit breaking, batching,
/// precomputation — exists to schedule, protect, and memoise calls to this
/// trait. The core never implements it; a minimax/MCTS/neural-net back end
/// does, and is out of scope for this crate.
#[async_trait::async_trait]
pub trait ComputeMove: Send + Sync {
    async fn compute_move(
        &self,
        board: &Board,
        player: PlayerColor,
        strategy: StrategyTag,
        deadline_ms: i64,
    ) -> Result<ComputeOutcome, CoreError>;
}

/// Pure lookup into a precomputed opening book. A failure is treated as a
/// miss by the caller, not surfaced as an error: this trait's contract
/// reflects that by returning `Option` directly rather than `Result`.
#[async_trait::async_trait]
pub trait OpeningBook: Send + Sync {
    async fn lookup(&self, board: &Board) -> Option<usize>;
}

/// Time source. Implementations should prefer a monotonic clock; the
/// default `SystemClock` uses wall-clock epoch milliseconds because
/// deadlines are compared against caller-supplied absolute timestamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock implementation of [`Clock`].
#[derive(Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as i64
    }
}

/// Source of randomness for jitter and tie-breaking. Deterministic seeding
/// is supported for tests via [`SeededRandom`].
pub trait RandomSource: Send + Sync {
    /// A float in `[0, 1)`.
    fn next_f32(&self) -> f32;
}

/// `rand`-backed [`RandomSource`] seeded once at construction, so tests can
/// reproduce a run by fixing the seed.
pub struct SeededRandom {
    rng: std::sync::Mutex<rand::rngs::SmallRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            rng: std::sync::Mutex::new(rand::rngs::SmallRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        use rand::SeedableRng;
        Self {
            rng: std::sync::Mutex::new(rand::rngs::SmallRng::from_os_rng()),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f32(&self) -> f32 {
        use rand::Rng;
        self.rng.lock().expect("random source lock poisoned").random::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_random_is_reproducible() {
        let a = SeededRandom::new(42);
        let b = SeededRandom::new(42);
        let sequence_a: Vec<f32> = (0..5).map(|_| a.next_f32()).collect();
        let sequence_b: Vec<f32> = (0..5).map(|_| b.next_f32()).collect();
        assert_eq!(sequence_a, sequence_b);
        assert!(sequence_a.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn system_clock_is_monotonically_nondecreasing_across_calls() {
        let clock = SystemClock;
        let a = clock.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now_millis();
        assert!(b >= a);
    }
}
