//! Ball Physics
//!
//! One fixed-size physics update: integration, wall and paddle bounces,
//! goals and ball reset. Pure with respect to wall-clock time; callers
//! always pass the fixed step, never measured elapsed time.

use crate::FRAMES_PER_SECOND;
use crate::game::events::GameEvent;
use crate::game::state::{
    MatchState, PlayerSide,
    BALL_SPEED, FIELD_CENTER, PADDLE_HALF_HEIGHT, PADDLE1_LINE, PADDLE2_LINE,
};

/// Advance `state` by exactly one step of `dt` seconds.
///
/// Velocities are per 1/60 s frame, so motion is scaled by `dt * 60` and a
/// step of 1/60 s moves the ball by exactly one velocity unit.
///
/// Order of resolution:
/// 1. Integrate position.
/// 2. Top/bottom wall bounce (no clamping, the ball may overshoot by one step).
/// 3. Paddle returns, checked against the paddles as they were before the step.
/// 4. Goals, each goal line checked independently, each followed by a reset.
pub fn step(state: &mut MatchState, dt: f64) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let scale = dt * FRAMES_PER_SECOND;

    // 1. Integrate
    state.ball_x += state.ball_dx * scale;
    state.ball_y += state.ball_dy * scale;

    // 2. Walls
    if state.ball_y <= 0.0 || state.ball_y >= 1.0 {
        state.ball_dy = -state.ball_dy;
        events.push(GameEvent::WallBounce);
    }

    // 3. Paddles
    let player1_return = state.ball_x <= PADDLE1_LINE && within_paddle(state.ball_y, state.paddle1_y);
    let player2_return = state.ball_x >= PADDLE2_LINE && within_paddle(state.ball_y, state.paddle2_y);

    if player1_return || player2_return {
        state.ball_dx = -state.ball_dx;
    }
    if player1_return {
        events.push(GameEvent::PaddleReturn { side: PlayerSide::Player1 });
    }
    if player2_return {
        events.push(GameEvent::PaddleReturn { side: PlayerSide::Player2 });
    }

    // 4. Goals
    if state.ball_x <= 0.0 {
        state.player2_score += 1;
        reset_ball(state);
        events.push(goal(state, PlayerSide::Player2));
    }
    if state.ball_x >= 1.0 {
        state.player1_score += 1;
        reset_ball(state);
        events.push(goal(state, PlayerSide::Player1));
    }

    events
}

/// Put the ball back at the center at base speed.
///
/// Direction is kept: each velocity component keeps its sign (zero counts
/// as positive) and only its magnitude returns to [`BALL_SPEED`].
pub fn reset_ball(state: &mut MatchState) {
    state.ball_x = FIELD_CENTER;
    state.ball_y = FIELD_CENTER;
    state.ball_dx = BALL_SPEED * direction(state.ball_dx);
    state.ball_dy = BALL_SPEED * direction(state.ball_dy);
}

#[inline]
fn direction(velocity: f64) -> f64 {
    if velocity < 0.0 { -1.0 } else { 1.0 }
}

#[inline]
fn within_paddle(ball_y: f64, paddle_y: f64) -> bool {
    ball_y >= paddle_y - PADDLE_HALF_HEIGHT && ball_y <= paddle_y + PADDLE_HALF_HEIGHT
}

fn goal(state: &MatchState, scorer: PlayerSide) -> GameEvent {
    GameEvent::Goal {
        scorer,
        player1_score: state.player1_score,
        player2_score: state.player2_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TICK_DT;
    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;

    fn state_with_ball(x: f64, y: f64, dx: f64, dy: f64) -> MatchState {
        MatchState {
            ball_x: x,
            ball_y: y,
            ball_dx: dx,
            ball_dy: dy,
            ..MatchState::new()
        }
    }

    #[test]
    fn test_free_flight_moves_one_frame() {
        let mut state = MatchState::new();
        let events = step(&mut state, TICK_DT);

        assert!(events.is_empty());
        assert_approx_eq!(state.ball_x, 0.505, 1e-12);
        assert_approx_eq!(state.ball_y, 0.505, 1e-12);
        assert_eq!(state.ball_dx, BALL_SPEED);
        assert_eq!(state.ball_dy, BALL_SPEED);
    }

    #[test]
    fn test_half_steps_match_full_step_in_free_flight() {
        let mut full = MatchState::new();
        let mut halves = MatchState::new();

        step(&mut full, TICK_DT);
        step(&mut halves, TICK_DT / 2.0);
        step(&mut halves, TICK_DT / 2.0);

        assert_approx_eq!(full.ball_x, halves.ball_x, 1e-12);
        assert_approx_eq!(full.ball_y, halves.ball_y, 1e-12);
    }

    #[test]
    fn test_wall_bounce_without_clamping() {
        let mut state = state_with_ball(0.5, 0.998, 0.005, 0.005);
        let events = step(&mut state, TICK_DT);

        assert_eq!(events, vec![GameEvent::WallBounce]);
        assert!(state.ball_y > 1.0, "ball is allowed to overshoot the wall");
        assert_eq!(state.ball_dy, -0.005);

        let mut state = state_with_ball(0.5, 0.002, 0.005, -0.005);
        step(&mut state, TICK_DT);
        assert!(state.ball_y < 0.0);
        assert_eq!(state.ball_dy, 0.005);
    }

    #[test]
    fn test_player1_paddle_returns_ball() {
        let mut state = state_with_ball(0.054, 0.55, -0.005, 0.0);
        state.paddle1_y = 0.5;
        let events = step(&mut state, TICK_DT);

        assert_eq!(events, vec![GameEvent::PaddleReturn { side: PlayerSide::Player1 }]);
        assert_eq!(state.ball_dx, 0.005);
        assert_eq!(state.player1_score + state.player2_score, 0);
    }

    #[test]
    fn test_player2_paddle_miss_is_not_a_return() {
        let mut state = state_with_ball(0.948, 0.2, 0.005, 0.0);
        state.paddle2_y = 0.8;
        let events = step(&mut state, TICK_DT);

        assert!(events.is_empty());
        assert_eq!(state.ball_dx, 0.005);
    }

    #[test]
    fn test_player2_paddle_returns_ball() {
        let mut state = state_with_ball(0.948, 0.75, 0.005, 0.0);
        state.paddle2_y = 0.8;
        let events = step(&mut state, TICK_DT);

        assert_eq!(events, vec![GameEvent::PaddleReturn { side: PlayerSide::Player2 }]);
        assert_eq!(state.ball_dx, -0.005);
    }

    #[test]
    fn test_goal_on_left_line_scores_for_player2() {
        let mut state = state_with_ball(0.003, 0.1, -0.005, 0.005);
        state.paddle1_y = 0.9;
        let events = step(&mut state, TICK_DT);

        assert_eq!(state.player2_score, 1);
        assert_eq!(state.player1_score, 0);
        assert_eq!(events, vec![GameEvent::Goal {
            scorer: PlayerSide::Player2,
            player1_score: 0,
            player2_score: 1,
        }]);
        assert_eq!(state.ball_x, 0.5);
        assert_eq!(state.ball_y, 0.5);
        assert_eq!(state.ball_dx, -0.005);
        assert_eq!(state.ball_dy, 0.005);
    }

    #[test]
    fn test_goal_on_right_line_scores_for_player1() {
        let mut state = state_with_ball(0.998, 0.1, 0.005, -0.005);
        state.paddle2_y = 0.9;
        step(&mut state, TICK_DT);

        assert_eq!(state.player1_score, 1);
        assert_eq!(state.ball_x, 0.5);
        assert_eq!(state.ball_dx, 0.005);
        assert_eq!(state.ball_dy, -0.005);
    }

    #[test]
    fn test_terminal_goal_from_behind_paddle() {
        let mut state = state_with_ball(-0.01, 0.5, -0.005, 0.005);
        state.player2_score = 4;

        let events = step(&mut state, TICK_DT);

        assert_eq!(state.player2_score, 5);
        assert!(state.is_terminal());
        assert!(events.iter().any(GameEvent::is_goal));
        assert_eq!(state.ball_x, 0.5);
        assert_eq!(state.ball_y, 0.5);
        assert_eq!(state.ball_dx.abs(), BALL_SPEED);
        assert_eq!(state.ball_dy.abs(), BALL_SPEED);
    }

    #[test]
    fn test_reset_keeps_direction() {
        let mut state = state_with_ball(0.2, 0.9, -0.02, 0.013);
        reset_ball(&mut state);
        assert_eq!((state.ball_dx, state.ball_dy), (-BALL_SPEED, BALL_SPEED));

        let mut state = state_with_ball(0.2, 0.9, 0.0, -0.0001);
        reset_ball(&mut state);
        assert_eq!((state.ball_dx, state.ball_dy), (BALL_SPEED, -BALL_SPEED));
    }

    proptest! {
        #[test]
        fn prop_step_is_deterministic(
            x in -0.02f64..1.02,
            y in -0.02f64..1.02,
            dx in prop::sample::select(vec![-0.005f64, 0.005]),
            dy in prop::sample::select(vec![-0.005f64, 0.005]),
            p1 in 0.0f64..1.0,
            p2 in 0.0f64..1.0,
        ) {
            let mut a = state_with_ball(x, y, dx, dy);
            a.paddle1_y = p1;
            a.paddle2_y = p2;
            let mut b = a;

            let events_a = step(&mut a, TICK_DT);
            let events_b = step(&mut b, TICK_DT);

            prop_assert_eq!(a, b);
            prop_assert_eq!(events_a, events_b);
        }

        #[test]
        fn prop_goal_always_resets_ball(
            x in -0.02f64..1.02,
            y in 0.0f64..1.0,
            dx in prop::sample::select(vec![-0.005f64, 0.005]),
            dy in prop::sample::select(vec![-0.005f64, 0.005]),
            p1 in 0.0f64..1.0,
            p2 in 0.0f64..1.0,
        ) {
            let mut state = state_with_ball(x, y, dx, dy);
            state.paddle1_y = p1;
            state.paddle2_y = p2;

            let before = state;
            let events = step(&mut state, TICK_DT);

            if events.iter().any(GameEvent::is_goal) {
                prop_assert_eq!(state.ball_x, 0.5);
                prop_assert_eq!(state.ball_y, 0.5);
                prop_assert_eq!(state.ball_dx.abs(), BALL_SPEED);
                prop_assert_eq!(state.ball_dy.abs(), BALL_SPEED);
                prop_assert_eq!(
                    before.player1_score + before.player2_score + 1,
                    state.player1_score + state.player2_score
                );
            } else {
                prop_assert_eq!(before.player1_score, state.player1_score);
                prop_assert_eq!(before.player2_score, state.player2_score);
            }
        }

        #[test]
        fn prop_paddles_never_move(
            x in -0.02f64..1.02,
            y in -0.02f64..1.02,
            p1 in 0.0f64..1.0,
            p2 in 0.0f64..1.0,
        ) {
            let mut state = state_with_ball(x, y, 0.005, -0.005);
            state.paddle1_y = p1;
            state.paddle2_y = p2;
            step(&mut state, TICK_DT);

            prop_assert_eq!(state.paddle1_y, p1);
            prop_assert_eq!(state.paddle2_y, p2);
        }
    }
}
