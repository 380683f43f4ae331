//! WebSocket Routes
//!
//! Maps the handshake request target to what the connection is for.

use crate::game::state::MatchId;

/// Purpose of a WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/ws/game/{id}`: play in a match.
    Game(MatchId),
    /// `/match`: ask for a seat.
    Matchmaking,
    /// `/match?id={id}`: read a persisted match.
    Snapshot(MatchId),
    /// Anything else.
    Unknown(String),
}

impl Route {
    /// Parse a request target such as `/ws/game/12/` or `/match?id=3`.
    pub fn parse(target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let path = path.strip_suffix('/').unwrap_or(path);

        if let Some(id) = path.strip_prefix("/ws/game/") {
            return match id.parse() {
                Ok(id) => Route::Game(id),
                Err(_) => Route::Unknown(target.to_string()),
            };
        }

        if path == "/match" {
            let id = query
                .into_iter()
                .flat_map(|q| q.split('&'))
                .find_map(|pair| pair.strip_prefix("id="));
            return match id {
                None => Route::Matchmaking,
                Some(id) => match id.parse() {
                    Ok(id) => Route::Snapshot(id),
                    Err(_) => Route::Unknown(target.to_string()),
                },
            };
        }

        Route::Unknown(target.to_string())
    }
}
