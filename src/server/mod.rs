//! Main server orchestration.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::protocol::RoomInfo;
use crate::room::{RoomRegistry, RoomSettings};

/// Process-wide server state shared by every session and HTTP handler.
pub struct GameServer {
    config: Arc<Config>,
    registry: RoomRegistry,
}

impl GameServer {
    pub fn new(config: Arc<Config>) -> Arc<Self> {
        let settings = RoomSettings::from(&config.server);
        Arc::new(Self {
            config,
            registry: RoomRegistry::new(settings),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Rooms a new player could still join (§ lobby listing).
    pub async fn list_available_rooms(&self) -> Vec<RoomInfo> {
        self.registry.list_available().await
    }

    /// Every room's lobby summary.
    pub async fn list_all_rooms(&self) -> Vec<RoomInfo> {
        self.registry.list_all().await
    }

    /// Liveness probe for the `/health` endpoint.
    pub async fn health_check(&self) -> bool {
        // No external collaborators in the core: alive means healthy
        true
    }

    /// Periodic sweep of abandoned rooms and expired reconnect slots.
    /// Expiry is also checked lazily on access; this task only bounds how
    /// long a fully abandoned room can linger.
    pub async fn cleanup_task(&self) {
        let interval = Duration::from_secs(self.config.server.room_cleanup_interval_secs.max(1));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let removed = self.registry.sweep().await;
            if removed > 0 {
                tracing::info!(removed, "Cleanup removed abandoned rooms");
            }
        }
    }
}
