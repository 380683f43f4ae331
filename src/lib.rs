//! # Pong Match Server
//!
//! Authoritative real-time engine for two-player pong matches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PONG MATCH SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/             - Simulation (deterministic)              │
//! │  ├── state.rs      - Match state, sides, winner              │
//! │  ├── physics.rs    - One fixed physics step                  │
//! │  ├── tick.rs       - Fixed-timestep accumulator              │
//! │  ├── interpolation.rs - Smoothed frames between states       │
//! │  └── events.rs     - Per-step events                         │
//! │                                                              │
//! │  store/            - Shared state                            │
//! │  ├── state.rs      - Live state + player counts              │
//! │  └── records.rs    - Durable match records                   │
//! │                                                              │
//! │  network/          - Networking (non-deterministic)          │
//! │  ├── server.rs     - WebSocket server, cleanup loop          │
//! │  ├── session.rs    - Match lifecycle and tick loop           │
//! │  ├── broadcast.rs  - Paced interpolated broadcast            │
//! │  ├── groups.rs     - Per-match fan-out                       │
//! │  ├── rate_limit.rs - Input rate limiting                     │
//! │  ├── matchmaking.rs- Pairing clients into matches            │
//! │  ├── route.rs      - Handshake path routing                  │
//! │  ├── protocol.rs   - Message types                           │
//! │  └── config.rs     - Environment configuration               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! The `game/` modules never read the clock. Physics always advances by
//! [`TICK_DT`]; wall-clock jitter is absorbed by the session's
//! fixed-timestep accumulator, so the same inputs replay to the same state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod store;
pub mod network;

// Re-export commonly used types
pub use game::state::{MatchId, MatchState, PlayerSide, Winner};
pub use store::{GameStateStore, MatchRepository};
pub use network::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Frames per second that ball velocities are expressed in.
pub const FRAMES_PER_SECOND: f64 = 60.0;

/// Fixed physics step in seconds.
pub const TICK_DT: f64 = 1.0 / TICK_RATE as f64;

/// Score that ends a match.
pub const WINNING_SCORE: u32 = 5;

/// Seats per match.
pub const MAX_PLAYERS: u8 = 2;
