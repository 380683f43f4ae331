//! Match Records
//!
//! Durable per-match record written by matchmaking (on creation) and by the
//! session (final score, once, when the match ends).

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::{MatchId, MatchState};

/// Persisted match record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Match identifier.
    pub id: MatchId,
    /// Player 1 final (or current) score.
    pub player1_score: u32,
    /// Player 2 final (or current) score.
    pub player2_score: u32,
    /// Ball x position.
    pub ball_x: f64,
    /// Ball y position.
    pub ball_y: f64,
    /// Ball x velocity.
    pub ball_dx: f64,
    /// Ball y velocity.
    pub ball_dy: f64,
    /// Player 1 paddle center.
    pub paddle1_y: f64,
    /// Player 2 paddle center.
    pub paddle2_y: f64,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the final score was written.
    pub finished_at: Option<DateTime<Utc>>,
}

impl MatchRecord {
    /// New record with the default match layout.
    pub fn new(id: MatchId) -> Self {
        let initial = MatchState::new();
        Self {
            id,
            player1_score: initial.player1_score,
            player2_score: initial.player2_score,
            ball_x: initial.ball_x,
            ball_y: initial.ball_y,
            ball_dx: initial.ball_dx,
            ball_dy: initial.ball_dy,
            paddle1_y: initial.paddle1_y,
            paddle2_y: initial.paddle2_y,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether the final score has been written.
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Persisted fields in match-state form.
    pub fn snapshot(&self) -> MatchState {
        MatchState {
            player1_score: self.player1_score,
            player2_score: self.player2_score,
            ball_x: self.ball_x,
            ball_y: self.ball_y,
            ball_dx: self.ball_dx,
            ball_dy: self.ball_dy,
            paddle1_y: self.paddle1_y,
            paddle2_y: self.paddle2_y,
        }
    }

    /// Copy the final score from `state` and stamp the finish time.
    pub fn record_final_score(&mut self, state: &MatchState, at: DateTime<Utc>) {
        self.player1_score = state.player1_score;
        self.player2_score = state.player2_score;
        self.finished_at = Some(at);
    }
}

/// Persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// No record exists for the match.
    #[error("No record for match {0}")]
    NotFound(MatchId),

    /// Backing storage failed.
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Durable store for match records.
pub trait MatchRepository: Send + Sync {
    /// Allocate a new match id and store its initial record.
    fn create(&self) -> Result<MatchRecord, PersistenceError>;

    /// Fetch a record by id.
    fn get(&self, id: MatchId) -> Result<MatchRecord, PersistenceError>;

    /// Insert or replace a record.
    fn save(&self, record: &MatchRecord) -> Result<(), PersistenceError>;
}

/// Process-local repository.
#[derive(Debug)]
pub struct InMemoryMatchRepository {
    records: Mutex<BTreeMap<MatchId, MatchRecord>>,
    next_id: AtomicU64,
}

impl InMemoryMatchRepository {
    /// Create an empty repository. Ids start at 1.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<MatchId, MatchRecord>>, PersistenceError> {
        self.records
            .lock()
            .map_err(|_| PersistenceError::Storage("record lock poisoned".to_string()))
    }
}

impl Default for InMemoryMatchRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchRepository for InMemoryMatchRepository {
    fn create(&self) -> Result<MatchRecord, PersistenceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = MatchRecord::new(id);
        self.records()?.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: MatchId) -> Result<MatchRecord, PersistenceError> {
        self.records()?
            .get(&id)
            .cloned()
            .ok_or(PersistenceError::NotFound(id))
    }

    fn save(&self, record: &MatchRecord) -> Result<(), PersistenceError> {
        self.records()?.insert(record.id, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_allocates_sequential_ids() {
        let repo = InMemoryMatchRepository::new();
        let a = repo.create().unwrap();
        let b = repo.create().unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(!a.is_finished());
        assert_eq!(repo.get(2).unwrap(), b);
    }

    #[test]
    fn test_missing_record() {
        let repo = InMemoryMatchRepository::new();
        assert_eq!(repo.get(42), Err(PersistenceError::NotFound(42)));
    }

    #[test]
    fn test_record_final_score() {
        let repo = InMemoryMatchRepository::new();
        let mut record = repo.create().unwrap();

        let state = MatchState {
            player1_score: 5,
            player2_score: 2,
            ..MatchState::new()
        };
        record.record_final_score(&state, Utc::now());
        repo.save(&record).unwrap();

        let stored = repo.get(record.id).unwrap();
        assert_eq!(stored.player1_score, 5);
        assert_eq!(stored.player2_score, 2);
        assert!(stored.is_finished());
    }

    #[test]
    fn test_new_record_uses_default_layout() {
        let record = MatchRecord::new(3);
        assert_eq!(record.ball_x, 0.5);
        assert_eq!(record.ball_dx, 0.005);
        assert_eq!(record.paddle2_y, 0.5);
        assert_eq!(record.snapshot(), MatchState::new());
    }
}
