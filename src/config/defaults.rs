//! Default value functions referenced by `#[serde(default = "...")]`.

pub fn default_port() -> u16 {
    8000
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub fn default_max_players_per_room() -> usize {
    2
}

pub fn default_reconnect_window_secs() -> u64 {
    60
}

pub fn default_game_start_delay_ms() -> i64 {
    500
}

pub fn default_chat_history_limit() -> usize {
    20
}

pub fn default_room_cleanup_interval_secs() -> u64 {
    30
}

pub fn default_session_queue_capacity() -> usize {
    64
}

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_log_rotation() -> String {
    "daily".to_string()
}
