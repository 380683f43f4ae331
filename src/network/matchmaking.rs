//! Matchmaking
//!
//! Pairs arriving clients two at a time. The first request creates a match
//! record and parks it in a single waiting slot; the next request takes it.
//! A parked match that nobody claims within the timeout is forgotten.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::game::state::{MatchId, MatchState, PlayerSide};
use crate::network::protocol::MatchTicket;
use crate::store::{MatchRepository, PersistenceError};

/// Default lifetime of an unclaimed waiting match.
pub const DEFAULT_WAITING_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct WaitingMatch {
    match_id: MatchId,
    parked_at: Instant,
}

/// Single-slot matchmaker backed by the match repository.
pub struct Matchmaker {
    repository: Arc<dyn MatchRepository>,
    waiting: Mutex<Option<WaitingMatch>>,
    timeout: Duration,
}

impl Matchmaker {
    /// Create a matchmaker whose waiting slot expires after `timeout`.
    pub fn new(repository: Arc<dyn MatchRepository>, timeout: Duration) -> Self {
        Self {
            repository,
            waiting: Mutex::new(None),
            timeout,
        }
    }

    /// Allocate a seat for a new client.
    pub async fn request_match(&self) -> Result<MatchTicket, PersistenceError> {
        self.request_match_at(Instant::now()).await
    }

    /// Allocate a seat as of `now`.
    pub async fn request_match_at(&self, now: Instant) -> Result<MatchTicket, PersistenceError> {
        let mut waiting = self.waiting.lock().await;

        if let Some(parked) = waiting.take() {
            if now.saturating_duration_since(parked.parked_at) <= self.timeout {
                info!(match_id = parked.match_id, "Paired with waiting match");
                return Ok(MatchTicket {
                    match_id: parked.match_id,
                    player_number: PlayerSide::Player2.number(),
                });
            }
            debug!(match_id = parked.match_id, "Waiting match expired");
        }

        let record = self.repository.create()?;
        *waiting = Some(WaitingMatch {
            match_id: record.id,
            parked_at: now,
        });
        info!(match_id = record.id, "Created match, waiting for opponent");

        Ok(MatchTicket {
            match_id: record.id,
            player_number: PlayerSide::Player1.number(),
        })
    }

    /// Persisted fields of a match.
    pub fn snapshot(&self, match_id: MatchId) -> Result<MatchState, PersistenceError> {
        Ok(self.repository.get(match_id)?.snapshot())
    }

    /// Clear the waiting slot if it expired by `now`. Returns the dropped id.
    pub async fn expire_waiting(&self, now: Instant) -> Option<MatchId> {
        let mut waiting = self.waiting.lock().await;
        match *waiting {
            Some(parked) if now.saturating_duration_since(parked.parked_at) > self.timeout => {
                *waiting = None;
                Some(parked.match_id)
            }
            _ => None,
        }
    }

    /// Match currently waiting for an opponent.
    pub async fn waiting_match(&self) -> Option<MatchId> {
        self.waiting.lock().await.map(|w| w.match_id)
    }
}
