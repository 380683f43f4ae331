//! Match State Definitions
//!
//! The authoritative state of one pong match. Positions live in the unit
//! square `[0,1] x [0,1]` with `0.5` at the center; velocities are expressed
//! in units per 1/60 s frame.

use serde::{Serialize, Deserialize};

use crate::WINNING_SCORE;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Base ball speed per axis (units per 1/60 s frame).
pub const BALL_SPEED: f64 = 0.005;

/// Center of the field on either axis.
pub const FIELD_CENTER: f64 = 0.5;

/// Half the paddle's vertical reach around its center.
pub const PADDLE_HALF_HEIGHT: f64 = 0.1;

/// Ball x at or below which player 1's paddle can return it.
pub const PADDLE1_LINE: f64 = 0.05;

/// Ball x at or above which player 2's paddle can return it.
pub const PADDLE2_LINE: f64 = 0.95;

/// Match identifier (shared with the persisted match record).
pub type MatchId = u64;

// =============================================================================
// PLAYER SIDE
// =============================================================================

/// Which paddle a player controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlayerSide {
    /// Left paddle, scores on the right goal line.
    Player1,
    /// Right paddle, scores on the left goal line.
    Player2,
}

impl PlayerSide {
    /// Both sides, in seating order.
    pub const ALL: [PlayerSide; 2] = [PlayerSide::Player1, PlayerSide::Player2];

    /// Player number as used by matchmaking (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            PlayerSide::Player1 => 1,
            PlayerSide::Player2 => 2,
        }
    }
}

// =============================================================================
// WINNER
// =============================================================================

/// Outcome of a finished match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// Player 1 reached the winning score.
    #[serde(rename = "Player 1")]
    Player1,
    /// Player 2 reached the winning score.
    #[serde(rename = "Player 2")]
    Player2,
    /// Both sides hold the same terminal score.
    #[serde(rename = "Draw")]
    Draw,
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Authoritative state of a single match.
///
/// Field names double as the wire format sent to clients.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    /// Goals scored by player 1.
    pub player1_score: u32,
    /// Goals scored by player 2.
    pub player2_score: u32,
    /// Ball x position.
    pub ball_x: f64,
    /// Ball y position.
    pub ball_y: f64,
    /// Ball x velocity per frame.
    pub ball_dx: f64,
    /// Ball y velocity per frame.
    pub ball_dy: f64,
    /// Center of player 1's paddle.
    pub paddle1_y: f64,
    /// Center of player 2's paddle.
    pub paddle2_y: f64,
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchState {
    /// Fresh match: no score, ball and paddles centered, ball heading down-right.
    pub const fn new() -> Self {
        Self {
            player1_score: 0,
            player2_score: 0,
            ball_x: FIELD_CENTER,
            ball_y: FIELD_CENTER,
            ball_dx: BALL_SPEED,
            ball_dy: BALL_SPEED,
            paddle1_y: FIELD_CENTER,
            paddle2_y: FIELD_CENTER,
        }
    }

    /// Move a side's paddle. Values are clamped to the field.
    pub fn set_paddle(&mut self, side: PlayerSide, y: f64) {
        let y = y.clamp(0.0, 1.0);
        match side {
            PlayerSide::Player1 => self.paddle1_y = y,
            PlayerSide::Player2 => self.paddle2_y = y,
        }
    }

    /// Whether either side has reached the winning score.
    pub fn is_terminal(&self) -> bool {
        self.player1_score >= WINNING_SCORE || self.player2_score >= WINNING_SCORE
    }

    /// Winner of a terminal state, `None` while the match is still running.
    ///
    /// If both sides are at or past the winning score the higher score wins
    /// and equal scores are a draw.
    pub fn winner(&self) -> Option<Winner> {
        let p1_done = self.player1_score >= WINNING_SCORE;
        let p2_done = self.player2_score >= WINNING_SCORE;

        match (p1_done, p2_done) {
            (false, false) => None,
            (true, false) => Some(Winner::Player1),
            (false, true) => Some(Winner::Player2),
            (true, true) => Some(match self.player1_score.cmp(&self.player2_score) {
                std::cmp::Ordering::Greater => Winner::Player1,
                std::cmp::Ordering::Less => Winner::Player2,
                std::cmp::Ordering::Equal => Winner::Draw,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_centered() {
        let state = MatchState::new();
        assert_eq!(state.player1_score, 0);
        assert_eq!(state.player2_score, 0);
        assert_eq!(state.ball_x, 0.5);
        assert_eq!(state.ball_y, 0.5);
        assert_eq!(state.ball_dx, 0.005);
        assert_eq!(state.ball_dy, 0.005);
        assert_eq!(state.paddle1_y, 0.5);
        assert_eq!(state.paddle2_y, 0.5);
        assert_eq!(state, MatchState::default());
    }

    #[test]
    fn test_set_paddle_only_touches_own_side() {
        let mut state = MatchState::new();
        state.set_paddle(PlayerSide::Player2, 0.8);
        assert_eq!(state.paddle2_y, 0.8);
        assert_eq!(state.paddle1_y, 0.5);

        state.set_paddle(PlayerSide::Player1, -3.0);
        assert_eq!(state.paddle1_y, 0.0);
        state.set_paddle(PlayerSide::Player1, 7.0);
        assert_eq!(state.paddle1_y, 1.0);
    }

    #[test]
    fn test_winner_requires_terminal_score() {
        let mut state = MatchState::new();
        state.player1_score = 4;
        state.player2_score = 4;
        assert!(!state.is_terminal());
        assert_eq!(state.winner(), None);

        state.player2_score = 5;
        assert!(state.is_terminal());
        assert_eq!(state.winner(), Some(Winner::Player2));

        state.player2_score = 4;
        state.player1_score = 5;
        assert_eq!(state.winner(), Some(Winner::Player1));
    }

    #[test]
    fn test_winner_tie_break() {
        let mut state = MatchState::new();
        state.player1_score = 5;
        state.player2_score = 5;
        assert_eq!(state.winner(), Some(Winner::Draw));

        state.player2_score = 6;
        assert_eq!(state.winner(), Some(Winner::Player2));
    }

    #[test]
    fn test_side_numbers() {
        assert_eq!(PlayerSide::ALL[0], PlayerSide::Player1);
        assert_eq!(PlayerSide::Player1.number(), 1);
        assert_eq!(PlayerSide::Player2.number(), 2);
    }

    #[test]
    fn test_winner_wire_names() {
        assert_eq!(serde_json::to_string(&Winner::Player1).unwrap(), "\"Player 1\"");
        assert_eq!(serde_json::to_string(&Winner::Player2).unwrap(), "\"Player 2\"");
        assert_eq!(serde_json::to_string(&Winner::Draw).unwrap(), "\"Draw\"");
    }
}
