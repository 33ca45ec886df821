//! Top-level orchestration: wires the cache, circuit breaker, batching,
//! strategy selection, and precompute crates into one callable surface
//! (`GetMove`, `AnalyseBoards`, `StreamAnalysis`, `SystemHealth`) and owns
//! the request-level concerns none of those crates know about on their
//! own — correlation ids, emergency-mode shedding, and outcome scoring.

mod analyze;
mod config;
mod engine;
mod errors;
mod fallback;
mod health;
mod namespaces;
mod pipeline;
mod stream;

pub use analyze::AnalyseRequest;
pub use analyze::AnalyseResult;
pub use config::EmergencyConfig;
pub use config::EngineConfig;
pub use engine::Engine;
pub use engine::EngineComponentConfigs;
pub use errors::RequestError;
pub use health::PrecomputeHealth;
pub use health::SystemHealth;
pub use stream::AnalysisUpdate;
