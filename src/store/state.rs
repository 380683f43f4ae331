//! Game State Store
//!
//! Keyed repository for live match state and per-match player counts.
//! Every access goes through one lock, and [`GameStateStore::update`] is an
//! atomic read-modify-write, so the tick loop and paddle updates can never
//! overwrite each other's changes.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::MAX_PLAYERS;
use crate::game::state::{MatchId, MatchState};

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Both seats of the match are already taken.
    #[error("Match {0} is full")]
    MatchFull(MatchId),
}

/// A stored state plus the last time anything touched it.
#[derive(Debug, Clone)]
struct StoredState {
    state: MatchState,
    touched_at: Instant,
}

impl StoredState {
    fn fresh(state: MatchState) -> Self {
        Self { state, touched_at: Instant::now() }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    states: BTreeMap<MatchId, StoredState>,
    player_counts: BTreeMap<MatchId, u8>,
}

/// Shared state repository for all matches.
#[derive(Debug, Default)]
pub struct GameStateStore {
    inner: RwLock<StoreInner>,
}

impl GameStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a match, initializing the default state if absent.
    pub async fn get(&self, match_id: MatchId) -> MatchState {
        let mut inner = self.inner.write().await;
        inner.states
            .entry(match_id)
            .or_insert_with(|| {
                debug!(match_id, "Initializing match state");
                StoredState::fresh(MatchState::new())
            })
            .state
    }

    /// State of a match without creating it.
    pub async fn peek(&self, match_id: MatchId) -> Option<MatchState> {
        let inner = self.inner.read().await;
        inner.states.get(&match_id).map(|s| s.state)
    }

    /// Overwrite a match's state.
    pub async fn save(&self, match_id: MatchId, state: MatchState) {
        let mut inner = self.inner.write().await;
        inner.states.insert(match_id, StoredState::fresh(state));
    }

    /// Remove a match's state. Returns whether anything was removed.
    pub async fn delete(&self, match_id: MatchId) -> bool {
        let mut inner = self.inner.write().await;
        inner.states.remove(&match_id).is_some()
    }

    /// Atomically read, mutate and write back a match's state.
    ///
    /// Missing state is initialized first, exactly as [`get`](Self::get) would.
    pub async fn update<F, R>(&self, match_id: MatchId, f: F) -> R
    where
        F: FnOnce(&mut MatchState) -> R,
    {
        let mut inner = self.inner.write().await;
        let stored = inner.states
            .entry(match_id)
            .or_insert_with(|| StoredState::fresh(MatchState::new()));
        let result = f(&mut stored.state);
        stored.touched_at = Instant::now();
        result
    }

    /// Like [`update`](Self::update), but leaves absent matches absent.
    pub async fn update_existing<F, R>(&self, match_id: MatchId, f: F) -> Option<R>
    where
        F: FnOnce(&mut MatchState) -> R,
    {
        let mut inner = self.inner.write().await;
        let stored = inner.states.get_mut(&match_id)?;
        let result = f(&mut stored.state);
        stored.touched_at = Instant::now();
        Some(result)
    }

    /// Take a seat in a match. Returns the new player count.
    pub async fn increment_player_count(&self, match_id: MatchId) -> Result<u8, StoreError> {
        let mut inner = self.inner.write().await;
        let count = inner.player_counts.entry(match_id).or_insert(0);
        if *count >= MAX_PLAYERS {
            return Err(StoreError::MatchFull(match_id));
        }
        *count += 1;
        Ok(*count)
    }

    /// Give up a seat. Never goes below zero. Returns the new player count.
    ///
    /// An emptied match drops its count entry; unknown matches read as zero.
    pub async fn decrement_player_count(&self, match_id: MatchId) -> u8 {
        let mut inner = self.inner.write().await;
        let Some(count) = inner.player_counts.get_mut(&match_id) else {
            return 0;
        };
        *count = count.saturating_sub(1);
        let remaining = *count;
        if remaining == 0 {
            inner.player_counts.remove(&match_id);
        }
        remaining
    }

    /// Current player count (zero for unknown matches).
    pub async fn player_count(&self, match_id: MatchId) -> u8 {
        let inner = self.inner.read().await;
        inner.player_counts.get(&match_id).copied().unwrap_or(0)
    }

    /// Number of matches with a nonzero player count.
    pub async fn seated_matches(&self) -> usize {
        self.inner.read().await.player_counts.len()
    }

    /// Number of matches with live state.
    pub async fn len(&self) -> usize {
        self.inner.read().await.states.len()
    }

    /// Whether no match has live state.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop states untouched for longer than `ttl`, except those in `active`.
    pub async fn purge_idle(
        &self,
        ttl: Duration,
        now: Instant,
        active: &BTreeSet<MatchId>,
    ) -> Vec<MatchId> {
        let mut inner = self.inner.write().await;

        let expired: Vec<MatchId> = inner.states
            .iter()
            .filter(|(id, s)| !active.contains(*id) && now.duration_since(s.touched_at) > ttl)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            inner.states.remove(id);
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_initializes_default_state() {
        let store = GameStateStore::new();
        assert!(store.peek(7).await.is_none());

        let first = store.get(7).await;
        let second = store.get(7).await;

        assert_eq!(first, MatchState::new());
        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let store = GameStateStore::new();
        let mut state = MatchState::new();
        state.player1_score = 3;

        store.save(1, state).await;
        assert_eq!(store.get(1).await.player1_score, 3);

        assert!(store.delete(1).await);
        assert!(!store.delete(1).await);
        assert!(store.peek(1).await.is_none());
        assert_eq!(store.get(1).await, MatchState::new());
    }

    #[tokio::test]
    async fn test_update_existing_does_not_resurrect() {
        let store = GameStateStore::new();
        let touched = store.update_existing(9, |s| s.paddle1_y = 0.1).await;
        assert!(touched.is_none());
        assert!(store.is_empty().await);

        store.get(9).await;
        let touched = store.update_existing(9, |s| s.paddle1_y = 0.1).await;
        assert!(touched.is_some());
        assert_eq!(store.get(9).await.paddle1_y, 0.1);
    }

    #[tokio::test]
    async fn test_player_count_bounds() {
        let store = GameStateStore::new();

        assert_eq!(store.decrement_player_count(3).await, 0);
        assert_eq!(store.increment_player_count(3).await, Ok(1));
        assert_eq!(store.increment_player_count(3).await, Ok(2));
        assert_eq!(store.increment_player_count(3).await, Err(StoreError::MatchFull(3)));
        assert_eq!(store.player_count(3).await, 2);

        assert_eq!(store.decrement_player_count(3).await, 1);
        assert_eq!(store.decrement_player_count(3).await, 0);
        assert_eq!(store.player_count(3).await, 0);
    }

    #[tokio::test]
    async fn test_finished_matches_leave_no_counts_behind() {
        let store = GameStateStore::new();

        for id in 0..100 {
            store.increment_player_count(id).await.unwrap();
            store.increment_player_count(id).await.unwrap();
            store.get(id).await;
            store.delete(id).await;
            store.decrement_player_count(id).await;
            store.decrement_player_count(id).await;
        }
        assert_eq!(store.seated_matches().await, 0);

        store.increment_player_count(500).await.unwrap();
        let later = Instant::now() + Duration::from_secs(3600);
        store.purge_idle(Duration::from_secs(1), later, &BTreeSet::new()).await;
        assert_eq!(store.seated_matches().await, 1);
        assert_eq!(store.player_count(500).await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let store = Arc::new(GameStateStore::new());
        store.get(1).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let left = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                left.update(1, |s| s.player1_score += 1).await;
            }));
            let right = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                right.update(1, |s| s.player2_score += 1).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let state = store.get(1).await;
        assert_eq!(state.player1_score, 50);
        assert_eq!(state.player2_score, 50);
    }

    #[tokio::test]
    async fn test_purge_idle_skips_active_matches() {
        let store = GameStateStore::new();
        store.get(1).await;
        store.get(2).await;
        store.decrement_player_count(1).await;

        let active: BTreeSet<MatchId> = [2].into_iter().collect();
        let later = Instant::now() + Duration::from_secs(10);

        let purged = store.purge_idle(Duration::from_secs(5), later, &active).await;
        assert_eq!(purged, vec![1]);
        assert!(store.peek(1).await.is_none());
        assert!(store.peek(2).await.is_some());

        let purged = store.purge_idle(Duration::from_secs(60), later, &BTreeSet::new()).await;
        assert!(purged.is_empty());
    }
}
