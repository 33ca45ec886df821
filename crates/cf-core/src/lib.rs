//! Shared types, traits, and constants for the Connect Four AI orchestration
//! core.
//!
//! This crate provides the foundational data model (`Board`, `Fingerprint`,
//! `MoveRequest`, `MoveResponse`), the error taxonomy, the core-out
//! collaborator traits (`ComputeMove`, `OpeningBook`, `Clock`,
//! `RandomSource`), and the event taxonomy shared by every other crate in
//! the workspace. It has no async compute logic of its own.
mod board;
mod constants;
mod error;
mod events;
mod id;
mod request;
mod traits;

pub use board::Board;
pub use board::Cell;
pub use board::Fingerprint;
pub use board::PlayerColor;
pub use board::COLS;
pub use board::ROWS;
pub use constants::*;
pub use error::CoreError;
pub use error::ErrorKind;
pub use events::Event;
pub use events::EventBus;
pub use id::ID;
pub use request::Alternative;
pub use request::MoveRequest;
pub use request::MoveResponse;
pub use request::StrategyTag;
pub use request::DEFAULT_TIME_LIMIT_MS;
pub use request::MAX_DIFFICULTY;
pub use request::MAX_PRIORITY;
pub use request::MIN_DIFFICULTY;
pub use request::MIN_PRIORITY;
pub use traits::Clock;
pub use traits::ComputeMove;
pub use traits::ComputeOutcome;
pub use traits::OpeningBook;
pub use traits::RandomSource;
pub use traits::SeededRandom;
pub use traits::SystemClock;
