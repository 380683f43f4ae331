//! Frame Interpolation
//!
//! Expands two consecutive authoritative states into a short run of blended
//! frames so clients see smooth motion between ticks. Frames are cosmetic:
//! they are produced from copies and never written back to the store.

use std::iter::FusedIterator;

use crate::game::state::MatchState;

/// Linear blend between `from` and `to`.
#[inline]
pub fn lerp(from: f64, to: f64, alpha: f64) -> f64 {
    from + (to - from) * alpha
}

/// Finite sequence of interpolated frames between two states.
///
/// Frame `i` (0-based) of `n` uses `alpha = (i + 1) / n`, so the last frame
/// lands exactly on the current state. Only ball and paddle positions are
/// blended; scores and velocities always come from the current state.
#[derive(Debug, Clone)]
pub struct InterpolatedFrames {
    previous: MatchState,
    current: MatchState,
    count: usize,
    emitted: usize,
}

/// Build the frame sequence from `previous` to `current` with `n` frames.
pub fn expand(previous: &MatchState, current: &MatchState, n: usize) -> InterpolatedFrames {
    InterpolatedFrames {
        previous: *previous,
        current: *current,
        count: n,
        emitted: 0,
    }
}

impl InterpolatedFrames {
    fn frame_at(&self, index: usize) -> MatchState {
        // Final frame is the authoritative state itself, not a blend that
        // might be off by a rounding error.
        if index + 1 == self.count {
            return self.current;
        }

        let alpha = (index + 1) as f64 / self.count as f64;
        let (prev, cur) = (&self.previous, &self.current);

        MatchState {
            ball_x: lerp(prev.ball_x, cur.ball_x, alpha),
            ball_y: lerp(prev.ball_y, cur.ball_y, alpha),
            paddle1_y: lerp(prev.paddle1_y, cur.paddle1_y, alpha),
            paddle2_y: lerp(prev.paddle2_y, cur.paddle2_y, alpha),
            ..*cur
        }
    }
}

impl Iterator for InterpolatedFrames {
    type Item = MatchState;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted >= self.count {
            return None;
        }
        let frame = self.frame_at(self.emitted);
        self.emitted += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.emitted;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for InterpolatedFrames {}

impl FusedIterator for InterpolatedFrames {}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn pair() -> (MatchState, MatchState) {
        let previous = MatchState {
            ball_x: 0.2,
            ball_y: 0.4,
            paddle1_y: 0.3,
            paddle2_y: 0.9,
            ..MatchState::new()
        };
        let current = MatchState {
            player1_score: 2,
            player2_score: 3,
            ball_x: 0.5,
            ball_y: 0.1,
            ball_dx: -0.005,
            ball_dy: -0.005,
            paddle1_y: 0.6,
            paddle2_y: 0.6,
        };
        (previous, current)
    }

    #[test]
    fn test_expand_three_frames() {
        let (prev, cur) = pair();
        let frames: Vec<_> = expand(&prev, &cur, 3).collect();

        assert_eq!(frames.len(), 3);

        let first = frames[0];
        assert_approx_eq!(first.ball_x, prev.ball_x + (cur.ball_x - prev.ball_x) / 3.0, 1e-12);
        assert_approx_eq!(first.ball_y, prev.ball_y + (cur.ball_y - prev.ball_y) / 3.0, 1e-12);
        assert_approx_eq!(first.paddle1_y, prev.paddle1_y + (cur.paddle1_y - prev.paddle1_y) / 3.0, 1e-12);
        assert_approx_eq!(first.paddle2_y, prev.paddle2_y + (cur.paddle2_y - prev.paddle2_y) / 3.0, 1e-12);

        let last = frames[2];
        assert_eq!(last.ball_x, cur.ball_x);
        assert_eq!(last.ball_y, cur.ball_y);
        assert_eq!(last.paddle1_y, cur.paddle1_y);
        assert_eq!(last.paddle2_y, cur.paddle2_y);
    }

    #[test]
    fn test_scores_and_velocity_pass_through() {
        let (prev, cur) = pair();

        for frame in expand(&prev, &cur, 4) {
            assert_eq!(frame.player1_score, cur.player1_score);
            assert_eq!(frame.player2_score, cur.player2_score);
            assert_eq!(frame.ball_dx, cur.ball_dx);
            assert_eq!(frame.ball_dy, cur.ball_dy);
        }
    }

    #[test]
    fn test_sequence_is_finite_and_exact_size() {
        let (prev, cur) = pair();
        let mut frames = expand(&prev, &cur, 2);

        assert_eq!(frames.len(), 2);
        assert!(frames.next().is_some());
        assert_eq!(frames.len(), 1);
        assert!(frames.next().is_some());
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_single_frame_is_current_state() {
        let (prev, cur) = pair();
        let frames: Vec<_> = expand(&prev, &cur, 1).collect();
        assert_eq!(frames, vec![cur]);
    }

    #[test]
    fn test_zero_frames_is_empty() {
        let (prev, cur) = pair();
        assert_eq!(expand(&prev, &cur, 0).count(), 0);
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let (prev, cur) = pair();
        let (prev_copy, cur_copy) = (prev, cur);
        let _ = expand(&prev, &cur, 5).last();
        assert_eq!(prev, prev_copy);
        assert_eq!(cur, cur_copy);
    }
}
