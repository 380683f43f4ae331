//! Game Logic Module
//!
//! All match simulation code. Deterministic: no wall-clock reads, no
//! randomness, no I/O.
//!
//! ## Module Structure
//!
//! - `state`: Match state, sides, winner, field constants
//! - `physics`: One fixed step of ball motion, bounces and goals
//! - `tick`: Fixed-timestep accumulator and batched advance
//! - `interpolation`: Smoothed frames between two authoritative states
//! - `events`: Per-step events for logging and replay checks

pub mod state;
pub mod physics;
pub mod tick;
pub mod interpolation;
pub mod events;

// Re-export key types
pub use state::{MatchId, MatchState, PlayerSide, Winner};
pub use tick::{FixedStepClock, TickResult};
pub use interpolation::{expand, InterpolatedFrames};
pub use events::GameEvent;
