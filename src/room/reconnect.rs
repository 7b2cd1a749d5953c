//! Reconnection support: token generation and disconnected-player retention.
//!
//! Tokens are pre-issued when a player joins (carried in the
//! `room_created` / `room_joined` reply) so the client already holds the
//! credential when its channel drops. Retained state lives room-side until
//! the grace window lapses; expiry is checked lazily on access and by the
//! periodic cleanup task.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngExt;

use crate::protocol::PlayerState;

/// Generate a URL-safe reconnect token from 16 bytes of entropy.
pub fn generate_reconnect_token() -> String {
    let mut bytes = [0u8; 16];
    if getrandom::fill(&mut bytes).is_err() {
        // fall back to the thread-local generator if the OS source fails
        let mut rng = rand::rng();
        for byte in &mut bytes {
            *byte = rng.random_range(0..=u8::MAX);
        }
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// A mid-game disconnect retained for the grace window.
#[derive(Debug, Clone)]
pub struct DisconnectedPlayer {
    /// Player record frozen at disconnect time
    pub player: PlayerState,
    /// When the channel dropped
    pub disconnected_at: DateTime<Utc>,
}

impl DisconnectedPlayer {
    pub fn new(player: PlayerState) -> Self {
        Self {
            player,
            disconnected_at: Utc::now(),
        }
    }

    /// Whether the grace window has lapsed.
    pub fn is_expired(&self, window: Duration) -> bool {
        Utc::now().signed_duration_since(self.disconnected_at) > window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_url_safe_and_unique() {
        let a = generate_reconnect_token();
        let b = generate_reconnect_token();

        assert_ne!(a, b);
        // 16 bytes -> 22 base64 chars without padding
        assert_eq!(a.len(), 22);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_expiry_window() {
        let player = PlayerState::for_slot("p".into(), "P".into(), 2);
        let mut entry = DisconnectedPlayer::new(player);

        assert!(!entry.is_expired(Duration::seconds(60)));

        entry.disconnected_at = Utc::now() - Duration::seconds(61);
        assert!(entry.is_expired(Duration::seconds(60)));
    }
}
