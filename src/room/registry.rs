//! Process-wide room registry.
//!
//! The table is guarded by one async `RwLock`; insertions, deletions and
//! room-code rejection sampling all run under the write guard so a freshly
//! sampled code can never collide.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::protocol::{generate_room_code, RoomId, RoomInfo};

use super::error::JoinError;
use super::state::{GameRoom, JoinGrant, RoomSettings, SessionSender};

pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<GameRoom>>>,
    settings: RoomSettings,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            settings,
        }
    }

    /// Create a room with a fresh unique code and seat the host in slot 1.
    pub async fn create(
        &self,
        room_name: String,
        host_id: &str,
        host_name: &str,
        sender: SessionSender,
    ) -> Result<(Arc<GameRoom>, JoinGrant), JoinError> {
        let room = {
            let mut rooms = self.rooms.write().await;
            // Rejection sampling: 32^6 codes, so a retry is already rare
            let room_id = loop {
                let candidate = generate_room_code();
                if !rooms.contains_key(&candidate) {
                    break candidate;
                }
            };
            let room = Arc::new(GameRoom::new(
                room_id.clone(),
                room_name,
                host_id.to_string(),
                self.settings.clone(),
            ));
            rooms.insert(room_id, Arc::clone(&room));
            room
        };

        tracing::info!(room_id = %room.room_id, %host_id, "Room created");

        match room.add_player(host_id, host_name, sender).await {
            Ok(grant) => Ok((room, grant)),
            Err(err) => {
                // never leave a hostless room in the table
                self.rooms.write().await.remove(&room.room_id);
                Err(err)
            }
        }
    }

    /// Join an existing room; fails when it is absent, full, or started.
    pub async fn join(
        &self,
        room_id: &str,
        player_id: &str,
        player_name: &str,
        sender: SessionSender,
    ) -> Result<(Arc<GameRoom>, JoinGrant), JoinError> {
        let room = self.get(room_id).await.ok_or(JoinError::RoomNotFound)?;
        let grant = room.add_player(player_id, player_name, sender).await?;
        Ok((room, grant))
    }

    pub async fn get(&self, room_id: &str) -> Option<Arc<GameRoom>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Explicit leave; deletes the room once nobody is left to come back.
    pub async fn leave(&self, room_id: &str, player_id: &str) {
        if let Some(room) = self.get(room_id).await {
            room.leave(player_id).await;
            self.delete_if_abandoned(&room).await;
        }
    }

    /// Involuntary disconnect; mid-game drops keep their reconnect slot.
    pub async fn disconnect(&self, room_id: &str, player_id: &str) {
        if let Some(room) = self.get(room_id).await {
            room.disconnect(player_id).await;
            self.delete_if_abandoned(&room).await;
        }
    }

    async fn delete_if_abandoned(&self, room: &Arc<GameRoom>) {
        if !room.expire_and_check_deletable().await {
            return;
        }
        if self.rooms.write().await.remove(&room.room_id).is_some() {
            let age_secs = Utc::now()
                .signed_duration_since(room.created_at)
                .num_seconds();
            tracing::info!(room_id = %room.room_id, age_secs, "Deleted empty room");
        }
    }

    /// Rooms a new player could still join: not started and not full.
    pub async fn list_available(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::new();
        for room in self.snapshot().await {
            let info = room.room_info().await;
            if !info.game_started && info.player_count < info.max_players {
                infos.push(info);
            }
        }
        infos
    }

    /// Every room's lobby summary, joinable or not.
    pub async fn list_all(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::new();
        for room in self.snapshot().await {
            infos.push(room.room_info().await);
        }
        infos
    }

    /// Drop rooms with no live members and no salvageable disconnects.
    /// Returns how many rooms were removed.
    pub async fn sweep(&self) -> usize {
        let mut abandoned = Vec::new();
        for room in self.snapshot().await {
            if room.expire_and_check_deletable().await {
                abandoned.push(room.room_id.clone());
            }
        }

        if abandoned.is_empty() {
            return 0;
        }

        let mut rooms = self.rooms.write().await;
        let mut removed = 0;
        for room_id in abandoned {
            if rooms.remove(&room_id).is_some() {
                tracing::info!(%room_id, "Swept abandoned room");
                removed += 1;
            }
        }
        removed
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn snapshot(&self) -> Vec<Arc<GameRoom>> {
        self.rooms.read().await.values().cloned().collect()
    }
}
