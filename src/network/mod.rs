//! Network Layer
//!
//! WebSocket server, match sessions and their collaborators.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod broadcast;
pub mod config;
pub mod groups;
pub mod matchmaking;
pub mod protocol;
pub mod rate_limit;
pub mod route;
pub mod session;
pub mod server;

pub use broadcast::InterpolationBroadcaster;
pub use config::ServerConfig;
pub use groups::{group_name, ConnectionId, GroupRegistry};
pub use matchmaking::Matchmaker;
pub use protocol::{GameOver, MatchTicket, PaddleUpdate, ServerMessage};
pub use rate_limit::InputRateLimiter;
pub use route::Route;
pub use session::{InputOutcome, MatchPhase, MatchSession, SessionConfig, SessionError, SessionManager};
pub use server::{GameServer, GameServerError};
