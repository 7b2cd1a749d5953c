//! Server behavior configuration types.

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_chat_history_limit, default_game_start_delay_ms, default_max_players_per_room,
    default_reconnect_window_secs, default_room_cleanup_interval_secs,
    default_session_queue_capacity,
};

/// Server configuration for room and session management.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Maximum players per room
    #[serde(default = "default_max_players_per_room")]
    pub max_players_per_room: usize,
    /// Grace window for mid-game reconnection (seconds)
    #[serde(default = "default_reconnect_window_secs")]
    pub reconnect_window_secs: u64,
    /// Delay between the start broadcast and the scheduled game start (milliseconds)
    #[serde(default = "default_game_start_delay_ms")]
    pub game_start_delay_ms: i64,
    /// Number of chat messages retained for replay on reconnect
    #[serde(default = "default_chat_history_limit")]
    pub chat_history_limit: usize,
    /// Interval for the abandoned-room cleanup task (seconds)
    #[serde(default = "default_room_cleanup_interval_secs")]
    pub room_cleanup_interval_secs: u64,
    /// Per-session outbound message queue depth
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players_per_room: default_max_players_per_room(),
            reconnect_window_secs: default_reconnect_window_secs(),
            game_start_delay_ms: default_game_start_delay_ms(),
            chat_history_limit: default_chat_history_limit(),
            room_cleanup_interval_secs: default_room_cleanup_interval_secs(),
            session_queue_capacity: default_session_queue_capacity(),
        }
    }
}
