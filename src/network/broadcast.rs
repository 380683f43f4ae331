//! Interpolated State Broadcast
//!
//! Turns one authoritative update into a paced run of interpolated frames
//! delivered to a match group.

use std::time::Duration;
use tracing::trace;

use crate::game::interpolation::expand;
use crate::game::state::MatchState;
use crate::network::groups::GroupRegistry;
use crate::network::protocol::ServerMessage;

/// Default number of frames per authoritative update.
pub const DEFAULT_INTERPOLATION_FRAMES: usize = 3;

/// Default delay between consecutive frames.
pub const DEFAULT_FRAME_PACING: Duration = Duration::from_millis(16);

/// Sends interpolated frames to a group with fixed pacing.
#[derive(Debug, Clone, Copy)]
pub struct InterpolationBroadcaster {
    frames: usize,
    pacing: Duration,
}

impl InterpolationBroadcaster {
    /// Create a broadcaster. At least one frame is always sent.
    pub fn new(frames: usize, pacing: Duration) -> Self {
        Self {
            frames: frames.max(1),
            pacing,
        }
    }

    /// Frames sent per update.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Send frames from `previous` to `current`, sleeping `pacing` between
    /// frames. Returns the number of frames sent.
    pub async fn broadcast(
        &self,
        groups: &GroupRegistry,
        group: &str,
        previous: &MatchState,
        current: &MatchState,
    ) -> usize {
        let mut sent = 0;
        for frame in expand(previous, current, self.frames) {
            if sent > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            groups.send_group(group, &ServerMessage::State(frame)).await;
            sent += 1;
        }
        trace!(group, sent, "Broadcast interpolated frames");
        sent
    }
}

impl Default for InterpolationBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPOLATION_FRAMES, DEFAULT_FRAME_PACING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_broadcast_sends_frames_in_order() {
        let groups = GroupRegistry::new();
        let (tx, mut rx) = mpsc::channel(16);
        groups.join("game_1", Uuid::new_v4(), tx).await;

        let previous = MatchState::new();
        let current = MatchState {
            ball_x: 0.8,
            player1_score: 1,
            ..MatchState::new()
        };

        let broadcaster = InterpolationBroadcaster::new(3, Duration::ZERO);
        assert_eq!(broadcaster.broadcast(&groups, "game_1", &previous, &current).await, 3);

        let mut xs = Vec::new();
        for _ in 0..3 {
            match rx.recv().await {
                Some(ServerMessage::State(frame)) => {
                    assert_eq!(frame.player1_score, 1);
                    xs.push(frame.ball_x);
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
        assert_eq!(xs[2], 0.8);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_zero_frames_still_sends_current_state() {
        let groups = GroupRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        groups.join("game_1", Uuid::new_v4(), tx).await;

        let broadcaster = InterpolationBroadcaster::new(0, Duration::ZERO);
        assert_eq!(broadcaster.frames(), 1);

        let current = MatchState { ball_y: 0.9, ..MatchState::new() };
        broadcaster.broadcast(&groups, "game_1", &MatchState::new(), &current).await;
        assert_eq!(rx.recv().await, Some(ServerMessage::State(current)));
    }

    #[tokio::test]
    async fn test_pacing_spaces_frames() {
        let groups = GroupRegistry::new();
        let (tx, _rx) = mpsc::channel(16);
        groups.join("game_1", Uuid::new_v4(), tx).await;

        let broadcaster = InterpolationBroadcaster::new(3, Duration::from_millis(5));
        let started = std::time::Instant::now();
        broadcaster.broadcast(&groups, "game_1", &MatchState::new(), &MatchState::new()).await;

        assert!(started.elapsed() >= Duration::from_millis(10));
    }
}
