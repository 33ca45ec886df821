use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub(crate) fn label(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Per-operation breaker state. Lives for the
/// process lifetime once an operation is first seen.
pub(crate) struct CircuitRecord {
    pub(crate) state: CircuitState,
    pub(crate) consecutive_failures: u32,
    pub(crate) next_attempt_at_ms: i64,
    pub(crate) half_open_inflight: u32,
    pub(crate) half_open_successes: u32,
    pub(crate) response_times_ms: VecDeque<u64>,
}

impl Default for CircuitRecord {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            next_attempt_at_ms: 0,
            half_open_inflight: 0,
            half_open_successes: 0,
            response_times_ms: VecDeque::new(),
        }
    }
}

pub(crate) struct Transition {
    pub(crate) from: &'static str,
    pub(crate) to: &'static str,
}

impl CircuitRecord {
    /// Attempts to admit a call. CLOSED always admits. OPEN admits only
    /// once `now_ms >= next_attempt_at_ms`, transitioning to HALF_OPEN and
    /// consuming one of its `half_open_permits` slots. HALF_OPEN admits up
    /// to `half_open_permits` concurrent probes.
    pub(crate) fn try_admit(&mut self, now_ms: i64, half_open_permits: u32) -> (bool, Option<Transition>) {
        match self.state {
            CircuitState::Closed => (true, None),
            CircuitState::Open => {
                if now_ms >= self.next_attempt_at_ms {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_inflight = 0;
                    self.half_open_successes = 0;
                    let (admitted, _) = self.try_admit(now_ms, half_open_permits);
                    (admitted, Some(Transition { from: "OPEN", to: "HALF_OPEN" }))
                } else {
                    (false, None)
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_inflight < half_open_permits {
                    self.half_open_inflight += 1;
                    (true, None)
                } else {
                    (false, None)
                }
            }
        }
    }

    pub(crate) fn record_success(&mut self, half_open_permits: u32, response_time_ms: u64, window: usize) -> Option<Transition> {
        self.push_response_time(response_time_ms, window);
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                self.half_open_inflight = self.half_open_inflight.saturating_sub(1);
                self.half_open_successes += 1;
                if self.half_open_successes >= half_open_permits {
                    self.state = CircuitState::Closed;
                    self.consecutive_failures = 0;
                    Some(Transition { from: "HALF_OPEN", to: "CLOSED" })
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    pub(crate) fn record_failure(&mut self, failure_threshold: u32, open_duration_ms: u64, now_ms: i64) -> Option<Transition> {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= failure_threshold {
                    self.state = CircuitState::Open;
                    self.next_attempt_at_ms = now_ms + open_duration_ms as i64;
                    Some(Transition { from: "CLOSED", to: "OPEN" })
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                self.half_open_inflight = self.half_open_inflight.saturating_sub(1);
                self.state = CircuitState::Open;
                self.next_attempt_at_ms = now_ms + open_duration_ms as i64;
                Some(Transition { from: "HALF_OPEN", to: "OPEN" })
            }
            CircuitState::Open => None,
        }
    }

    fn push_response_time(&mut self, ms: u64, window: usize) {
        self.response_times_ms.push_back(ms);
        while self.response_times_ms.len() > window {
            self.response_times_ms.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_trips_open_after_threshold() {
        let mut record = CircuitRecord::default();
        assert!(record.record_failure(3, 1000, 0).is_none());
        assert!(record.record_failure(3, 1000, 0).is_none());
        let t = record.record_failure(3, 1000, 0).unwrap();
        assert_eq!((t.from, t.to), ("CLOSED", "OPEN"));
        assert_eq!(record.state, CircuitState::Open);
    }

    #[test]
    fn open_rejects_until_next_attempt_at() {
        let mut record = CircuitRecord::default();
        record.state = CircuitState::Open;
        record.next_attempt_at_ms = 1000;
        let (admitted, transition) = record.try_admit(500, 3);
        assert!(!admitted);
        assert!(transition.is_none());
    }

    #[test]
    fn open_transitions_to_half_open_past_deadline() {
        let mut record = CircuitRecord::default();
        record.state = CircuitState::Open;
        record.next_attempt_at_ms = 1000;
        let (admitted, transition) = record.try_admit(1000, 3);
        assert!(admitted);
        assert_eq!(record.state, CircuitState::HalfOpen);
        assert_eq!(transition.unwrap().to, "HALF_OPEN");
    }

    #[test]
    fn half_open_admits_up_to_permits_then_rejects() {
        let mut record = CircuitRecord::default();
        record.state = CircuitState::HalfOpen;
        assert!(record.try_admit(0, 2).0);
        assert!(record.try_admit(0, 2).0);
        assert!(!record.try_admit(0, 2).0);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let mut record = CircuitRecord::default();
        record.state = CircuitState::HalfOpen;
        record.try_admit(0, 3);
        let t = record.record_failure(5, 2000, 100).unwrap();
        assert_eq!((t.from, t.to), ("HALF_OPEN", "OPEN"));
        assert_eq!(record.next_attempt_at_ms, 2100);
    }

    #[test]
    fn half_open_closes_after_k_consecutive_successes() {
        let mut record = CircuitRecord::default();
        record.state = CircuitState::HalfOpen;
        record.try_admit(0, 2);
        assert!(record.record_success(2, 5, 10).is_none());
        let t = record.record_success(2, 5, 10).unwrap();
        assert_eq!((t.from, t.to), ("HALF_OPEN", "CLOSED"));
    }
}
