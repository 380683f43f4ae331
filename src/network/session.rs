//! Match Session Management
//!
//! One [`MatchSession`] per connected client, coordinated by a shared
//! [`SessionManager`] that owns each match's lifecycle and its single
//! tick-loop task.
//!
//! ```text
//! WaitingForPeer ──second join──▶ Active ──terminal score──▶ Ended
//!        ▲                          │
//!        └──── tick owner leaves ───┘
//! ```
//!
//! The connection whose join starts the tick loop owns it; only that
//! connection's disconnect cancels it. The match state survives the
//! cancellation and play resumes when a second player joins again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::TICK_DT;
use crate::game::events::GameEvent;
use crate::game::state::{MatchId, MatchState, PlayerSide, Winner};
use crate::game::tick::{advance, FixedStepClock, TickResult};
use crate::network::broadcast::{
    InterpolationBroadcaster, DEFAULT_FRAME_PACING, DEFAULT_INTERPOLATION_FRAMES,
};
use crate::network::groups::{group_name, ConnectionId, GroupRegistry, Outbox};
use crate::network::protocol::{GameOver, PaddleUpdate, ServerMessage};
use crate::network::rate_limit::{InputRateLimiter, DEFAULT_INPUT_INTERVAL};
use crate::store::{GameStateStore, MatchRepository, PersistenceError, StoreError};

/// Sent privately to the first player of a match.
pub const WAITING_MESSAGE: &str = "Waiting for another player to join...";

/// Sent to the group when the second player joins.
pub const STARTING_MESSAGE: &str = "Both players have joined. The game is starting!";

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Timing knobs shared by every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the tick loop wakes up.
    pub tick_poll: Duration,
    /// Most physics steps simulated in a single wake.
    pub max_steps_per_wake: u32,
    /// Minimum spacing between admitted inputs of one connection.
    pub input_interval: Duration,
    /// Interpolated frames per authoritative update.
    pub interpolation_frames: usize,
    /// Delay between interpolated frames.
    pub frame_pacing: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_poll: Duration::from_millis(16),
            max_steps_per_wake: 10,
            input_interval: DEFAULT_INPUT_INTERVAL,
            interpolation_frames: DEFAULT_INTERPOLATION_FRAMES,
            frame_pacing: DEFAULT_FRAME_PACING,
        }
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Fewer than two players, or the tick owner left.
    WaitingForPeer,
    /// Tick loop running.
    Active,
    /// Terminal score reached and finalized.
    Ended,
}

/// Ownership of a match's tick loop.
#[derive(Debug)]
enum TickTask {
    /// No loop yet, or the owner left.
    Idle,
    /// Loop running, cancelled only by `owner`'s disconnect.
    Running {
        owner: ConnectionId,
        handle: JoinHandle<()>,
    },
    /// Loop finished on its own.
    Stopped,
}

#[derive(Debug)]
struct MatchLifecycle {
    phase: MatchPhase,
    tick_task: TickTask,
    seats: BTreeMap<PlayerSide, ConnectionId>,
}

impl MatchLifecycle {
    fn new() -> Self {
        Self {
            phase: MatchPhase::WaitingForPeer,
            tick_task: TickTask::Idle,
            seats: BTreeMap::new(),
        }
    }

    fn free_seat(&self) -> Option<PlayerSide> {
        PlayerSide::ALL.into_iter().find(|side| !self.seats.contains_key(side))
    }

    fn is_running(&self) -> bool {
        matches!(self.tick_task, TickTask::Running { .. })
    }
}

/// What happened to one inbound paddle update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Paddle moved and the new state was broadcast.
    Applied,
    /// Arrived too soon after the previous admitted input.
    RateLimited,
    /// Carried nothing for this connection's paddle, or the match is over.
    Ignored,
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Both seats are taken.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The match already has a final score.
    #[error("Match {0} has already finished")]
    MatchFinished(MatchId),
}

// =============================================================================
// MATCH SESSION
// =============================================================================

/// One client's seat in a match.
pub struct MatchSession {
    match_id: MatchId,
    connection_id: ConnectionId,
    side: PlayerSide,
    group: String,
    manager: Arc<SessionManager>,
}

impl MatchSession {
    /// Match this session belongs to.
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Connection that owns this session.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Paddle this connection controls.
    pub fn side(&self) -> PlayerSide {
        self.side
    }

    /// Apply a paddle update from this connection.
    pub async fn handle_input(&self, update: PaddleUpdate) -> InputOutcome {
        self.manager.apply_input(self, update).await
    }

    /// Leave the match.
    pub async fn disconnect(self) {
        self.manager.release(&self).await;
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Shared coordinator for all matches.
pub struct SessionManager {
    config: SessionConfig,
    store: Arc<GameStateStore>,
    groups: Arc<GroupRegistry>,
    repository: Arc<dyn MatchRepository>,
    broadcaster: InterpolationBroadcaster,
    limiter: InputRateLimiter<ConnectionId>,
    matches: RwLock<BTreeMap<MatchId, MatchLifecycle>>,
}

impl SessionManager {
    /// Create a manager over the given collaborators.
    pub fn new(
        config: SessionConfig,
        store: Arc<GameStateStore>,
        groups: Arc<GroupRegistry>,
        repository: Arc<dyn MatchRepository>,
    ) -> Self {
        let broadcaster = InterpolationBroadcaster::new(config.interpolation_frames, config.frame_pacing);
        let limiter = InputRateLimiter::new(config.input_interval);

        Self {
            config,
            store,
            groups,
            repository,
            broadcaster,
            limiter,
            matches: RwLock::new(BTreeMap::new()),
        }
    }

    /// Live state store.
    pub fn store(&self) -> &Arc<GameStateStore> {
        &self.store
    }

    /// Seat a connection in a match.
    ///
    /// The first player is told to wait; the second triggers the starting
    /// broadcast and the tick loop.
    #[instrument(skip(self, outbox))]
    pub async fn connect(
        self: &Arc<Self>,
        match_id: MatchId,
        connection_id: ConnectionId,
        outbox: Outbox,
    ) -> Result<MatchSession, SessionError> {
        if self.is_finished(match_id).await {
            return Err(SessionError::MatchFinished(match_id));
        }

        let count = self.store.increment_player_count(match_id).await?;

        let side = {
            let mut matches = self.matches.write().await;
            let lifecycle = matches.entry(match_id).or_insert_with(MatchLifecycle::new);
            let side = lifecycle.free_seat();
            if let Some(side) = side {
                lifecycle.seats.insert(side, connection_id);
            }
            side
        };
        let Some(side) = side else {
            self.store.decrement_player_count(match_id).await;
            return Err(StoreError::MatchFull(match_id).into());
        };

        let group = group_name(match_id);
        self.groups.join(&group, connection_id, outbox).await;
        self.store.get(match_id).await;
        info!(match_id, ?side, count, "Player joined");

        if count == 1 {
            self.groups
                .send_member(&group, &connection_id, ServerMessage::info(WAITING_MESSAGE))
                .await;
        } else {
            self.groups.send_group(&group, &ServerMessage::info(STARTING_MESSAGE)).await;
            self.start_tick_loop(match_id, connection_id).await;
        }

        Ok(MatchSession {
            match_id,
            connection_id,
            side,
            group,
            manager: Arc::clone(self),
        })
    }

    /// Current phase of a match, if it is tracked.
    pub async fn phase(&self, match_id: MatchId) -> Option<MatchPhase> {
        self.matches.read().await.get(&match_id).map(|l| l.phase)
    }

    /// Whether a tick loop is running for the match.
    pub async fn is_running(&self, match_id: MatchId) -> bool {
        self.matches
            .read()
            .await
            .get(&match_id)
            .map(MatchLifecycle::is_running)
            .unwrap_or(false)
    }

    /// Matches with a running tick loop.
    pub async fn active_matches(&self) -> BTreeSet<MatchId> {
        self.matches
            .read()
            .await
            .iter()
            .filter(|(_, l)| l.is_running())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Abort every running tick loop.
    pub async fn stop_all(&self) {
        let mut matches = self.matches.write().await;
        for (match_id, lifecycle) in matches.iter_mut() {
            if let TickTask::Running { handle, .. } = std::mem::replace(&mut lifecycle.tick_task, TickTask::Idle) {
                handle.abort();
                lifecycle.phase = MatchPhase::WaitingForPeer;
                debug!(match_id, "Tick loop aborted");
            }
        }
    }

    async fn is_finished(&self, match_id: MatchId) -> bool {
        if self.phase(match_id).await == Some(MatchPhase::Ended) {
            return true;
        }
        match self.repository.get(match_id) {
            Ok(record) => record.is_finished(),
            Err(PersistenceError::NotFound(_)) => false,
            Err(e) => {
                warn!(match_id, error = %e, "Could not check match record");
                false
            }
        }
    }

    async fn start_tick_loop(self: &Arc<Self>, match_id: MatchId, owner: ConnectionId) {
        let mut matches = self.matches.write().await;
        let Some(lifecycle) = matches.get_mut(&match_id) else {
            return;
        };
        if !matches!(lifecycle.tick_task, TickTask::Idle) {
            debug!(match_id, "Tick loop already running");
            return;
        }

        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move { manager.run_tick_loop(match_id).await });
        lifecycle.tick_task = TickTask::Running { owner, handle };
        lifecycle.phase = MatchPhase::Active;
        info!(match_id, "Match started");
    }

    async fn run_tick_loop(self: Arc<Self>, match_id: MatchId) {
        let mut poll = interval(self.config.tick_poll.max(Duration::from_millis(1)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = FixedStepClock::new(Duration::from_secs_f64(TICK_DT), self.config.max_steps_per_wake);
        let mut last_wake = Instant::now();

        loop {
            poll.tick().await;
            let now = Instant::now();
            let budget = clock.advance(now.duration_since(last_wake));
            last_wake = now;

            if budget.dropped > 0 {
                warn!(match_id, dropped = budget.dropped, "Tick loop fell behind, dropping steps");
            }
            if budget.steps == 0 {
                continue;
            }

            match self.run_steps(match_id, budget.steps).await {
                Some(result) if result.match_ended => break,
                Some(_) => {}
                None => {
                    warn!(match_id, "Match state vanished, stopping tick loop");
                    self.mark_stopped(match_id).await;
                    break;
                }
            }
        }
    }

    /// Advance the match by `steps`, broadcast, and finalize on a terminal
    /// score. `None` when the match has no live state.
    async fn run_steps(&self, match_id: MatchId, steps: u32) -> Option<TickResult> {
        let (previous, current, result) = self
            .store
            .update_existing(match_id, |state| {
                let previous = *state;
                let result = advance(state, steps, TICK_DT);
                (previous, *state, result)
            })
            .await?;

        for event in &result.events {
            if let GameEvent::Goal { scorer, player1_score, player2_score } = event {
                debug!(match_id, ?scorer, player1_score, player2_score, "Goal");
            }
        }

        self.broadcaster
            .broadcast(&self.groups, &group_name(match_id), &previous, &current)
            .await;

        if let Some(winner) = result.winner.filter(|_| result.match_ended) {
            self.finish_match(match_id, current, winner).await;
        }

        Some(result)
    }

    async fn finish_match(&self, match_id: MatchId, final_state: MatchState, winner: Winner) {
        {
            let mut matches = self.matches.write().await;
            if let Some(lifecycle) = matches.get_mut(&match_id) {
                lifecycle.phase = MatchPhase::Ended;
                lifecycle.tick_task = TickTask::Stopped;
            }
        }

        let group = group_name(match_id);
        if let Err(e) = self.persist_final_score(match_id, &final_state) {
            error!(match_id, error = %e, "Failed to persist final score");
            self.groups
                .send_group(&group, &ServerMessage::error(format!("Failed to record final score: {e}")))
                .await;
        }

        self.groups
            .send_group(&group, &ServerMessage::GameOver(GameOver::new(&final_state, winner)))
            .await;
        self.store.delete(match_id).await;

        info!(
            match_id,
            player1_score = final_state.player1_score,
            player2_score = final_state.player2_score,
            ?winner,
            "Match finished"
        );
    }

    fn persist_final_score(&self, match_id: MatchId, state: &MatchState) -> Result<(), PersistenceError> {
        let mut record = self.repository.get(match_id)?;
        record.record_final_score(state, Utc::now());
        self.repository.save(&record)
    }

    async fn mark_stopped(&self, match_id: MatchId) {
        let mut matches = self.matches.write().await;
        if let Some(lifecycle) = matches.get_mut(&match_id) {
            lifecycle.tick_task = TickTask::Stopped;
        }
    }

    async fn apply_input(&self, session: &MatchSession, update: PaddleUpdate) -> InputOutcome {
        if !self.limiter.admit(&session.connection_id) {
            trace!(match_id = session.match_id, "Input rate limited");
            return InputOutcome::RateLimited;
        }

        let Some(y) = update.for_side(session.side) else {
            return InputOutcome::Ignored;
        };

        if self.phase(session.match_id).await == Some(MatchPhase::Ended) {
            return InputOutcome::Ignored;
        }

        let side = session.side;
        let updated = self
            .store
            .update_existing(session.match_id, |state| {
                state.set_paddle(side, y);
                *state
            })
            .await;

        match updated {
            Some(state) => {
                self.groups.send_group(&session.group, &ServerMessage::State(state)).await;
                InputOutcome::Applied
            }
            None => InputOutcome::Ignored,
        }
    }

    async fn release(&self, session: &MatchSession) {
        let match_id = session.match_id;
        self.groups.leave(&session.group, &session.connection_id).await;
        self.limiter.sweep();
        let count = self.store.decrement_player_count(match_id).await;

        let mut matches = self.matches.write().await;
        let forget_match = match matches.get_mut(&match_id) {
            Some(lifecycle) => {
                if lifecycle.seats.get(&session.side) == Some(&session.connection_id) {
                    lifecycle.seats.remove(&session.side);
                }

                let owns_loop = matches!(
                    &lifecycle.tick_task,
                    TickTask::Running { owner, .. } if *owner == session.connection_id
                );
                if owns_loop {
                    if let TickTask::Running { handle, .. } = std::mem::replace(&mut lifecycle.tick_task, TickTask::Idle) {
                        handle.abort();
                    }
                    lifecycle.phase = MatchPhase::WaitingForPeer;
                    info!(match_id, "Tick loop cancelled");
                }

                lifecycle.seats.is_empty() && !lifecycle.is_running()
            }
            None => false,
        };
        if forget_match {
            matches.remove(&match_id);
        }

        info!(match_id, side = ?session.side, count, "Player left");
    }
}

/// Outbound channel for a new connection.
pub fn outbox(capacity: usize) -> (Outbox, mpsc::Receiver<ServerMessage>) {
    mpsc::channel(capacity)
}
