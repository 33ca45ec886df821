//! Circuit breaker and backoff retry around an unreliable operation.
mod breaker;
mod config;
mod record;
mod retry;

pub use breaker::BreakerSnapshot;
pub use breaker::CircuitBreaker;
pub use config::BreakerConfig;
pub use config::OperationOverride;
pub use config::RetryConfig;
pub use record::CircuitState;
pub use retry::retry_with_backoff;
