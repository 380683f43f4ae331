//! Group Messaging
//!
//! Named groups of connections with fan-out delivery. A match's two
//! connections share one group derived from the match id.

use std::collections::BTreeMap;
use tokio::sync::{mpsc, RwLock};
use tracing::trace;
use uuid::Uuid;

use crate::game::state::MatchId;
use crate::network::protocol::ServerMessage;

/// Identity of one WebSocket connection.
pub type ConnectionId = Uuid;

/// Outbound message channel of one connection.
pub type Outbox = mpsc::Sender<ServerMessage>;

/// Group name for a match.
pub fn group_name(match_id: MatchId) -> String {
    format!("game_{match_id}")
}

/// Registry of groups and their members.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: RwLock<BTreeMap<String, BTreeMap<ConnectionId, Outbox>>>,
}

impl GroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member to a group, replacing any previous outbox for it.
    pub async fn join(&self, group: &str, member: ConnectionId, outbox: Outbox) {
        let mut groups = self.groups.write().await;
        groups.entry(group.to_string()).or_default().insert(member, outbox);
    }

    /// Remove a member. Empty groups are dropped.
    pub async fn leave(&self, group: &str, member: &ConnectionId) -> bool {
        let mut groups = self.groups.write().await;
        let Some(members) = groups.get_mut(group) else {
            return false;
        };
        let removed = members.remove(member).is_some();
        if members.is_empty() {
            groups.remove(group);
        }
        removed
    }

    /// Deliver a message to every member. Returns how many accepted it.
    ///
    /// Members whose connection already closed are skipped.
    pub async fn send_group(&self, group: &str, message: &ServerMessage) -> usize {
        let outboxes: Vec<Outbox> = {
            let groups = self.groups.read().await;
            match groups.get(group) {
                Some(members) => members.values().cloned().collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for outbox in outboxes {
            if outbox.send(message.clone()).await.is_ok() {
                delivered += 1;
            } else {
                trace!(group, "Skipping closed member");
            }
        }
        delivered
    }

    /// Deliver a message to one member of a group.
    pub async fn send_member(&self, group: &str, member: &ConnectionId, message: ServerMessage) -> bool {
        let outbox = {
            let groups = self.groups.read().await;
            groups.get(group).and_then(|members| members.get(member)).cloned()
        };

        match outbox {
            Some(outbox) => outbox.send(message).await.is_ok(),
            None => false,
        }
    }

    /// Number of members in a group.
    pub async fn member_count(&self, group: &str) -> usize {
        let groups = self.groups.read().await;
        groups.get(group).map(|m| m.len()).unwrap_or(0)
    }
}
