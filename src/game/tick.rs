//! Fixed-Timestep Simulation
//!
//! Decouples the physics rate from the wall-clock wake-ups of the match loop.
//! The loop feeds measured elapsed time into a [`FixedStepClock`], which hands
//! back a whole number of fixed steps; [`advance`] applies them to the state
//! and stops as soon as the match reaches a terminal score.

use std::time::Duration;

use crate::game::events::GameEvent;
use crate::game::physics::step;
use crate::game::state::{MatchState, Winner};

/// Steps granted by one clock advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepBudget {
    /// Whole steps to simulate now.
    pub steps: u32,
    /// Whole steps discarded because the per-wake cap was hit.
    pub dropped: u32,
}

/// Accumulates wall-clock time and converts it into fixed simulation steps.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    step: Duration,
    max_steps: u32,
    accumulated: Duration,
}

impl FixedStepClock {
    /// Create a clock producing steps of `step`, at most `max_steps` per advance.
    pub fn new(step: Duration, max_steps: u32) -> Self {
        Self {
            step,
            max_steps: max_steps.max(1),
            accumulated: Duration::ZERO,
        }
    }

    /// Add `elapsed` wall-clock time and take out as many whole steps as fit.
    ///
    /// Time beyond `max_steps` whole steps is thrown away (the sub-step
    /// remainder is kept) so a long stall cannot trigger a catch-up burst.
    pub fn advance(&mut self, elapsed: Duration) -> StepBudget {
        self.accumulated += elapsed;

        let mut budget = StepBudget::default();
        while self.accumulated >= self.step {
            self.accumulated -= self.step;
            if budget.steps < self.max_steps {
                budget.steps += 1;
            } else {
                budget.dropped += 1;
            }
        }
        budget
    }

    /// Time carried over to the next advance.
    pub fn remainder(&self) -> Duration {
        self.accumulated
    }
}

/// Result of advancing a match by a batch of steps.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Steps actually applied.
    pub steps_applied: u32,
    /// Events generated across all applied steps.
    pub events: Vec<GameEvent>,
    /// Whether the match reached a terminal score.
    pub match_ended: bool,
    /// Winner, when the match ended.
    pub winner: Option<Winner>,
}

/// Apply up to `steps` physics steps of `dt` seconds.
///
/// Stops right after the step that produces a terminal score; that step is
/// kept. A state that is already terminal is left untouched and reported
/// as ended.
pub fn advance(state: &mut MatchState, steps: u32, dt: f64) -> TickResult {
    let mut result = TickResult::default();

    for _ in 0..steps {
        if state.is_terminal() {
            break;
        }
        result.events.extend(step(state, dt));
        result.steps_applied += 1;
    }

    if state.is_terminal() {
        result.match_ended = true;
        result.winner = state.winner();
    }

    result
}

/// Run `ticks` steps from `state` without any clock, returning the final
/// state and every event. Used to reproduce a match offline.
pub fn replay(mut state: MatchState, ticks: u32, dt: f64) -> (MatchState, Vec<GameEvent>) {
    let result = advance(&mut state, ticks, dt);
    (state, result.events)
}
