//! Server Configuration
//!
//! Settings come from `PONG_*` environment variables. A variable that is
//! missing keeps its default; one that fails to parse is logged and also
//! keeps its default.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::network::broadcast::{DEFAULT_FRAME_PACING, DEFAULT_INTERPOLATION_FRAMES};
use crate::network::matchmaking::DEFAULT_WAITING_TIMEOUT;
use crate::network::rate_limit::DEFAULT_INPUT_INTERVAL;
use crate::network::session::SessionConfig;

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Tick loop wake-up interval.
    pub tick_poll: Duration,
    /// Minimum spacing between admitted inputs per connection.
    pub input_interval: Duration,
    /// Interpolated frames per authoritative update.
    pub interpolation_frames: usize,
    /// Delay between interpolated frames.
    pub frame_pacing: Duration,
    /// Lifetime of an unclaimed matchmaking slot.
    pub waiting_timeout: Duration,
    /// Idle time after which an abandoned match state is purged.
    pub state_ttl: Duration,
    /// Most physics steps per tick-loop wake.
    pub max_steps_per_wake: u32,
    /// How often the cleanup loop runs.
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            tick_poll: Duration::from_millis(16),
            input_interval: DEFAULT_INPUT_INTERVAL,
            interpolation_frames: DEFAULT_INTERPOLATION_FRAMES,
            frame_pacing: DEFAULT_FRAME_PACING,
            waiting_timeout: DEFAULT_WAITING_TIMEOUT,
            state_ttl: Duration::from_secs(300),
            max_steps_per_wake: 10,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            parse_or(&lookup, key, default.as_millis() as u64).max(1)
        };
        let secs = |key: &str, default: Duration| parse_or(&lookup, key, default.as_secs());

        Self {
            bind_addr: parse_or(&lookup, "PONG_BIND_ADDR", defaults.bind_addr),
            max_connections: parse_or(&lookup, "PONG_MAX_CONNECTIONS", defaults.max_connections),
            tick_poll: Duration::from_millis(millis("PONG_TICK_POLL_MS", defaults.tick_poll)),
            input_interval: Duration::from_millis(millis("PONG_INPUT_INTERVAL_MS", defaults.input_interval)),
            interpolation_frames: parse_or(&lookup, "PONG_INTERPOLATION_FRAMES", defaults.interpolation_frames).max(1),
            frame_pacing: Duration::from_millis(parse_or(
                &lookup,
                "PONG_FRAME_PACING_MS",
                defaults.frame_pacing.as_millis() as u64,
            )),
            waiting_timeout: Duration::from_secs(secs("PONG_WAITING_TIMEOUT_SECS", defaults.waiting_timeout)),
            state_ttl: Duration::from_secs(secs("PONG_STATE_TTL_SECS", defaults.state_ttl)),
            max_steps_per_wake: parse_or(&lookup, "PONG_MAX_STEPS_PER_WAKE", defaults.max_steps_per_wake).max(1),
            cleanup_interval: defaults.cleanup_interval,
        }
    }

    /// Session timing derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_poll: self.tick_poll,
            max_steps_per_wake: self.max_steps_per_wake,
            input_interval: self.input_interval,
            interpolation_frames: self.interpolation_frames,
            frame_pacing: self.frame_pacing,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Invalid config value, using default");
                default
            }
        },
    }
}
