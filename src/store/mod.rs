//! Storage Layer
//!
//! - `state`: Live match state and player counts, shared by every task of a match
//! - `records`: Durable match records (creation and final score)

pub mod state;
pub mod records;

pub use state::{GameStateStore, StoreError};
pub use records::{InMemoryMatchRepository, MatchRecord, MatchRepository, PersistenceError};
