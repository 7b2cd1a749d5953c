//! Per-session message router.
//!
//! Each session carries two cursors, the bound room and player id, set by
//! the first successful `create_room` / `join_room` / `reconnect`. Host-only
//! actions from a non-host are discarded inside the room handlers without a
//! reply; `start_game` is the one exception and answers with an explicit
//! error to aid the lobby UX.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::protocol::{is_valid_room_code, ClientMessage, PlayerId, RoomId, ServerMessage};
use crate::room::{GameRoom, SessionSender};
use crate::server::GameServer;

/// Path sentinel requesting room creation instead of naming a code.
const NEW_ROOM_PATH: &str = "new";

pub(super) struct Session {
    server: Arc<GameServer>,
    tx: SessionSender,
    addr: SocketAddr,
    path_room_id: String,
    room: Option<Arc<GameRoom>>,
    player_id: Option<PlayerId>,
}

impl Session {
    pub(super) fn new(
        server: Arc<GameServer>,
        tx: SessionSender,
        addr: SocketAddr,
        path_room_id: String,
    ) -> Self {
        Self {
            server,
            tx,
            addr,
            path_room_id,
            room: None,
            player_id: None,
        }
    }

    pub(super) async fn dispatch(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::CreateRoom {
                name,
                player_id,
                player_name,
            } => self.handle_create_room(name, player_id, player_name).await,
            ClientMessage::JoinRoom {
                room_id,
                player_id,
                player_name,
            } => self.handle_join_room(room_id, player_id, player_name).await,
            ClientMessage::Reconnect {
                room_id,
                player_id,
                token,
            } => self.handle_reconnect(room_id, player_id, token).await,
            ClientMessage::Ping => self.send(ServerMessage::Pong).await,
            ClientMessage::LeaveRoom => self.handle_leave_room().await,
            ClientMessage::StartGame => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                if let Err(err) = room.start_game(&player_id).await {
                    self.send_error(err.to_string()).await;
                }
            }
            ClientMessage::PlayerReady { is_ready } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.set_ready(&player_id, is_ready).await;
            }
            ClientMessage::PlayerState { state } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.update_player_state(&player_id, state).await;
            }
            ClientMessage::GameAction { action, data } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.game_action(&player_id, action, data).await;
            }
            ClientMessage::CollectItem { item_type, item_id } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.collect_item(&player_id, item_type, item_id).await;
            }
            ClientMessage::EnemyState { enemy_id, state } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.enemy_state(&player_id, &enemy_id, state).await;
            }
            ClientMessage::EnemySpawn { enemy } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.enemy_spawn(&player_id, enemy).await;
            }
            ClientMessage::EnemyKilled { enemy_id } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.enemy_killed(&player_id, &enemy_id).await;
            }
            ClientMessage::CoinSpawn { coin } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.coin_spawn(&player_id, coin).await;
            }
            ClientMessage::SyncEntities { enemies, coins } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.sync_entities(&player_id, enemies, coins).await;
            }
            ClientMessage::Chat { message } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.chat(&player_id, message).await;
            }
            ClientMessage::TimeSync { client_time } => {
                let Some((room, player_id)) = self.binding() else {
                    return;
                };
                room.time_sync(&player_id, client_time).await;
            }
        }
    }

    /// Involuntary teardown: protocol error or closed channel. Mid-game
    /// members keep their reconnect slot, lobby members are removed.
    pub(super) async fn close(&mut self) {
        if let (Some(room), Some(player_id)) = (self.room.take(), self.player_id.take()) {
            tracing::info!(
                client_addr = %self.addr,
                room_id = %room.room_id,
                %player_id,
                "Session ended, handling disconnect"
            );
            self.server
                .registry()
                .disconnect(&room.room_id, &player_id)
                .await;
        }
    }

    async fn handle_create_room(
        &mut self,
        name: Option<String>,
        player_id: PlayerId,
        player_name: String,
    ) {
        if self.room.is_some() {
            self.send_error("Already in a room").await;
            return;
        }

        let room_name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{player_name}'s Room"));

        match self
            .server
            .registry()
            .create(room_name, &player_id, &player_name, self.tx.clone())
            .await
        {
            Ok((room, grant)) => {
                self.send(ServerMessage::RoomCreated {
                    room_id: room.room_id.clone(),
                    player_id: player_id.clone(),
                    player_number: grant.player_number,
                    reconnect_token: grant.reconnect_token,
                    room_info: grant.room_info,
                })
                .await;
                self.room = Some(room);
                self.player_id = Some(player_id);
            }
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_join_room(
        &mut self,
        room_id: Option<RoomId>,
        player_id: PlayerId,
        player_name: String,
    ) {
        if self.room.is_some() {
            self.send_error("Already in a room").await;
            return;
        }

        let Some(room_id) = self.resolve_room_id(room_id) else {
            self.send_error("Room not found").await;
            return;
        };

        match self
            .server
            .registry()
            .join(&room_id, &player_id, &player_name, self.tx.clone())
            .await
        {
            Ok((room, grant)) => {
                self.send(ServerMessage::RoomJoined {
                    room_id: room.room_id.clone(),
                    player_id: player_id.clone(),
                    player_number: grant.player_number,
                    reconnect_token: grant.reconnect_token,
                    room_info: grant.room_info,
                })
                .await;
                self.room = Some(room);
                self.player_id = Some(player_id);
            }
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_reconnect(
        &mut self,
        room_id: Option<RoomId>,
        player_id: PlayerId,
        token: String,
    ) {
        if self.room.is_some() {
            self.send_error("Already in a room").await;
            return;
        }

        let Some(room_id) = self.resolve_room_id(room_id) else {
            self.send_error("Room not found").await;
            return;
        };
        let Some(room) = self.server.registry().get(&room_id).await else {
            self.send_error("Room not found").await;
            return;
        };

        match room
            .reconnect_player(&player_id, &token, self.tx.clone())
            .await
        {
            Ok(grant) => {
                self.send(ServerMessage::Reconnected {
                    room_id: room.room_id.clone(),
                    player_id: player_id.clone(),
                    player_number: grant.player_number,
                    game_state: grant.game_state,
                })
                .await;
                self.room = Some(room);
                self.player_id = Some(player_id);
            }
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_leave_room(&mut self) {
        let Some((room, player_id)) = self.binding() else {
            return;
        };
        self.room = None;
        self.player_id = None;

        self.server
            .registry()
            .leave(&room.room_id, &player_id)
            .await;
        self.send(ServerMessage::RoomLeft).await;
    }

    /// Pick the room code from the message, falling back to the endpoint
    /// path. Codes are normalized to uppercase.
    fn resolve_room_id(&self, from_message: Option<RoomId>) -> Option<RoomId> {
        let candidate = from_message
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.path_room_id.clone())
            .trim()
            .to_uppercase();

        if candidate == NEW_ROOM_PATH.to_uppercase() || !is_valid_room_code(&candidate) {
            return None;
        }
        Some(candidate)
    }

    fn binding(&self) -> Option<(Arc<GameRoom>, PlayerId)> {
        match (&self.room, &self.player_id) {
            (Some(room), Some(player_id)) => Some((Arc::clone(room), player_id.clone())),
            _ => None,
        }
    }

    async fn send(&self, message: ServerMessage) {
        if self.tx.send(Arc::new(message)).await.is_err() {
            tracing::debug!(client_addr = %self.addr, "Session queue closed while replying");
        }
    }

    async fn send_error(&self, message: impl Into<String>) {
        self.send(ServerMessage::Error {
            message: message.into(),
        })
        .await;
    }
}
