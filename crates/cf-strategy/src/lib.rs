//! Strategy Selector: picks a primary compute strategy, a
//! strictly simpler fallback, and an execution budget for a move request,
//! scored from closed-form baselines plus rolling per-strategy performance.

mod config;
mod record;
mod selector;

pub use config::PhaseBonus;
pub use config::SelectorConfig;
pub use config::StrategyBaseline;
pub use record::Outcome;
pub use record::StrategyRecord;
pub use selector::Phase;
pub use selector::Selection;
pub use selector::StrategySelector;
