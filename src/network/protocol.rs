//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are plain JSON objects without a type tag; the set of keys
//! identifies the message.

use serde::{Serialize, Deserialize};

use crate::game::state::{MatchId, MatchState, PlayerSide, Winner};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Paddle position update sent by a client.
///
/// Either key may be missing; unknown keys are ignored. A connection only
/// ever moves its own paddle, the other key is discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PaddleUpdate {
    /// New center for player 1's paddle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paddle1_y: Option<f64>,
    /// New center for player 2's paddle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paddle2_y: Option<f64>,
}

impl PaddleUpdate {
    /// Position requested for `side`, if the update carries one.
    pub fn for_side(&self, side: PlayerSide) -> Option<f64> {
        let value = match side {
            PlayerSide::Player1 => self.paddle1_y,
            PlayerSide::Player2 => self.paddle2_y,
        };
        value.filter(|y| y.is_finite())
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
///
/// Variant order matters for deserialization: the more specific shapes
/// come first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Terminal payload, sent once when the match ends.
    GameOver(GameOver),

    /// Full or interpolated match state. Also used for record snapshots.
    State(MatchState),

    /// Matchmaking result.
    Ticket(MatchTicket),

    /// Informational text.
    Info {
        /// Human-readable message.
        message: String,
    },

    /// Something went wrong on the server side.
    Error {
        /// Human-readable error.
        error: String,
    },
}

/// Final result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameOver {
    /// Player 1 final score.
    pub player1_score: u32,
    /// Player 2 final score.
    pub player2_score: u32,
    /// Who won.
    pub winner: Winner,
    /// Always `true`.
    pub game_over: bool,
}

impl GameOver {
    /// Terminal payload for a finished state.
    pub fn new(state: &MatchState, winner: Winner) -> Self {
        Self {
            player1_score: state.player1_score,
            player2_score: state.player2_score,
            winner,
            game_over: true,
        }
    }
}

/// Matchmaking allocation handed to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTicket {
    /// Match to connect to.
    pub match_id: MatchId,
    /// 1 for the creator, 2 for the joiner.
    pub player_number: u8,
}

impl ServerMessage {
    /// Informational message.
    pub fn info(message: impl Into<String>) -> Self {
        ServerMessage::Info { message: message.into() }
    }

    /// Error message.
    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error { error: error.into() }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
