//! Configuration validation.

use super::Config;

/// Validate a loaded configuration, collecting every problem into one error.
///
/// Called from `main` both for `--validate-config` and before startup.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut problems = Vec::new();

    if config.server.max_players_per_room < 2 {
        problems.push(format!(
            "server.max_players_per_room must be at least 2 (got {})",
            config.server.max_players_per_room
        ));
    }

    if config.server.reconnect_window_secs == 0 {
        problems.push("server.reconnect_window_secs must be nonzero".to_string());
    }

    if config.server.game_start_delay_ms < 0 {
        problems.push(format!(
            "server.game_start_delay_ms must be nonnegative (got {})",
            config.server.game_start_delay_ms
        ));
    }

    if config.server.session_queue_capacity == 0 {
        problems.push("server.session_queue_capacity must be nonzero".to_string());
    }

    if !matches!(
        config.logging.rotation.to_lowercase().as_str(),
        "daily" | "hourly" | "never"
    ) {
        problems.push(format!(
            "logging.rotation must be one of daily, hourly, never (got {:?})",
            config.logging.rotation
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}
