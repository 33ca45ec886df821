use std::fmt;

/// Stable error kind, independent of the human-readable message. Callers
/// should match on this, not on `Display` output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    NoLegalMove,
    DeadlineExceeded,
    TransientCompute,
    QueueFull,
    CircuitOpen,
    Internal,
}

/// Core error taxonomy. `InvalidInput` and `NoLegalMove` are
/// non-retryable and never open a circuit. `TransientCompute` and
/// `Internal` count toward breaker failure counts. `DeadlineExceeded` and
/// `QueueFull` are non-retryable by default and never trip a breaker.
#[derive(Clone, Debug)]
pub enum CoreError {
    InvalidInput(String),
    NoLegalMove,
    DeadlineExceeded,
    TransientCompute(String),
    QueueFull,
    CircuitOpen,
    Internal(String),
}

impl CoreError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        CoreError::InvalidInput(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        CoreError::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            CoreError::NoLegalMove => ErrorKind::NoLegalMove,
            CoreError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            CoreError::TransientCompute(_) => ErrorKind::TransientCompute,
            CoreError::QueueFull => ErrorKind::QueueFull,
            CoreError::CircuitOpen => ErrorKind::CircuitOpen,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the retry wrapper should attempt this error again, absent a
    /// caller-supplied `shouldRetry` predicate override.
    pub fn retryable_by_default(&self) -> bool {
        matches!(self, CoreError::TransientCompute(_) | CoreError::Internal(_))
    }

    /// Whether this error counts toward a circuit breaker's failure count.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(self, CoreError::TransientCompute(_) | CoreError::Internal(_))
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            CoreError::NoLegalMove => write!(f, "no legal move: board is full"),
            CoreError::DeadlineExceeded => write!(f, "deadline exceeded"),
            CoreError::TransientCompute(msg) => write!(f, "transient compute failure: {msg}"),
            CoreError::QueueFull => write!(f, "queue full"),
            CoreError::CircuitOpen => write!(f, "circuit open"),
            CoreError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_not_retryable_and_does_not_trip_breaker() {
        let err = CoreError::invalid_input("gravity violation");
        assert!(!err.retryable_by_default());
        assert!(!err.counts_toward_breaker());
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn transient_compute_is_retryable_and_trips_breaker() {
        let err = CoreError::TransientCompute("timeout".into());
        assert!(err.retryable_by_default());
        assert!(err.counts_toward_breaker());
    }

    #[test]
    fn deadline_exceeded_never_trips_breaker() {
        let err = CoreError::DeadlineExceeded;
        assert!(!err.counts_toward_breaker());
        assert!(!err.retryable_by_default());
    }
}
