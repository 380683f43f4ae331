//! Game Events
//!
//! Things that happened during a physics step. Used for logging and for
//! tests; clients only ever see the resulting state.

use serde::{Serialize, Deserialize};

use crate::game::state::PlayerSide;

/// A discrete event produced by one physics step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Ball hit the top or bottom wall.
    WallBounce,

    /// A paddle returned the ball.
    PaddleReturn {
        /// Side whose paddle made contact.
        side: PlayerSide,
    },

    /// A goal was scored and the ball reset.
    Goal {
        /// Side credited with the point.
        scorer: PlayerSide,
        /// Player 1 score after the goal.
        player1_score: u32,
        /// Player 2 score after the goal.
        player2_score: u32,
    },
}

impl GameEvent {
    /// Whether this event changed the score.
    pub fn is_goal(&self) -> bool {
        matches!(self, GameEvent::Goal { .. })
    }
}
