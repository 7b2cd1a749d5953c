//! Per-room aggregate state and broadcast fan-out.
//!
//! All mutation for one room happens under its single async mutex, so the
//! single-flight guarantees (first collect wins, first kill wins) and their
//! side effects never interleave between sessions. Outbound sends enqueue
//! onto per-session channels without suspending; a closed channel marks the
//! session for pruning, performed after the fan-out completes.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::RngExt;
use serde::Deserialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use crate::config::ServerConfig;
use crate::protocol::{
    ChatEntry, Coin, Enemy, EnemyBehavior, EnemyUpdate, GameState, ItemKind, PlayerId,
    PlayerSnapshot, PlayerState, PlayerSummary, PlayerUpdate, RoomId, RoomInfo, ServerMessage,
};

use super::drops::death_drop_coins;
use super::error::{JoinError, ReconnectError, StartGameError};
use super::reconnect::{generate_reconnect_token, DisconnectedPlayer};

/// Outbound queue handle for one session.
pub type SessionSender = mpsc::Sender<Arc<ServerMessage>>;

/// Game mode tag carried in every snapshot.
const GAME_MODE: &str = "online_coop";

/// Room behavior knobs, derived from [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub max_players: usize,
    pub reconnect_window_secs: u64,
    pub game_start_delay_ms: i64,
    pub chat_history_limit: usize,
}

impl From<&ServerConfig> for RoomSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_players: config.max_players_per_room,
            reconnect_window_secs: config.reconnect_window_secs,
            game_start_delay_ms: config.game_start_delay_ms,
            chat_history_limit: config.chat_history_limit,
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Data handed back to a freshly joined player.
#[derive(Debug, Clone)]
pub struct JoinGrant {
    pub player_number: u8,
    pub reconnect_token: String,
    pub room_info: RoomInfo,
}

/// Data handed back to a successfully reconnected player.
#[derive(Debug, Clone)]
pub struct ReconnectGrant {
    pub player_number: u8,
    pub game_state: Box<GameState>,
}

/// Payload of a host `assist` action.
#[derive(Debug, Deserialize)]
struct AssistData {
    target_player_id: PlayerId,
    x: f64,
    y: f64,
}

/// One online co-op room. The server is the source of truth for membership,
/// entity identity, collection and game-start timing.
#[derive(Debug)]
pub struct GameRoom {
    pub room_id: RoomId,
    pub created_at: DateTime<Utc>,
    inner: Mutex<RoomInner>,
}

#[derive(Debug)]
struct RoomInner {
    room_id: RoomId,
    room_name: String,
    host_id: PlayerId,
    settings: RoomSettings,
    seed: u32,
    level: u32,
    game_started: bool,
    game_start_timestamp: Option<i64>,
    sequence_id: u64,
    players: HashMap<PlayerId, PlayerState>,
    connections: HashMap<PlayerId, SessionSender>,
    /// Join order; retained across mid-game disconnects so slots stay stable
    player_order: Vec<PlayerId>,
    disconnected: HashMap<PlayerId, DisconnectedPlayer>,
    /// Tokens pre-issued at join, validated on reconnect
    reconnect_tokens: HashMap<PlayerId, String>,
    enemies: HashMap<String, Enemy>,
    coins: HashMap<String, Coin>,
    collected_coins: HashSet<String>,
    collected_powerups: HashSet<String>,
    chat_history: VecDeque<ChatEntry>,
    entity_counter: u64,
}

fn server_now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl GameRoom {
    pub fn new(room_id: RoomId, room_name: String, host_id: PlayerId, settings: RoomSettings) -> Self {
        let seed = rand::rng().random_range(1..=999_999u32);
        let inner = RoomInner {
            room_id: room_id.clone(),
            room_name,
            host_id,
            settings,
            seed,
            level: 1,
            game_started: false,
            game_start_timestamp: None,
            sequence_id: 0,
            players: HashMap::new(),
            connections: HashMap::new(),
            player_order: Vec::new(),
            disconnected: HashMap::new(),
            reconnect_tokens: HashMap::new(),
            enemies: HashMap::new(),
            coins: HashMap::new(),
            collected_coins: HashSet::new(),
            collected_powerups: HashSet::new(),
            chat_history: VecDeque::new(),
            entity_counter: 0,
        };
        Self {
            room_id,
            created_at: Utc::now(),
            inner: Mutex::new(inner),
        }
    }

    /// Add a player and announce them; fails when the room is full, the game
    /// has started, or the id is already bound.
    pub async fn add_player(
        &self,
        player_id: &str,
        player_name: &str,
        sender: SessionSender,
    ) -> Result<JoinGrant, JoinError> {
        let mut inner = self.inner.lock().await;
        inner.add_player(player_id, player_name, sender)
    }

    /// Explicit leave: no reconnection retention regardless of game phase.
    pub async fn leave(&self, player_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.remove_player(player_id, false);
    }

    /// Involuntary disconnect: mid-game drops are retained for the grace
    /// window, lobby drops are removed outright.
    pub async fn disconnect(&self, player_id: &str) {
        let mut inner = self.inner.lock().await;
        let allow_reconnect = inner.game_started;
        inner.remove_player(player_id, allow_reconnect);
    }

    pub async fn reconnect_player(
        &self,
        player_id: &str,
        token: &str,
        sender: SessionSender,
    ) -> Result<ReconnectGrant, ReconnectError> {
        let mut inner = self.inner.lock().await;
        inner.reconnect_player(player_id, token, sender)
    }

    pub async fn set_ready(&self, player_id: &str, is_ready: bool) {
        let mut inner = self.inner.lock().await;
        inner.set_ready(player_id, is_ready);
    }

    pub async fn update_player_state(&self, player_id: &str, update: PlayerUpdate) {
        let mut inner = self.inner.lock().await;
        inner.update_player_state(player_id, update);
    }

    pub async fn game_action(&self, player_id: &str, action: String, data: serde_json::Value) {
        let mut inner = self.inner.lock().await;
        inner.game_action(player_id, action, data);
    }

    pub async fn collect_item(&self, player_id: &str, item_type: ItemKind, item_id: String) {
        let mut inner = self.inner.lock().await;
        inner.collect_item(player_id, item_type, item_id);
    }

    pub async fn enemy_state(&self, player_id: &str, enemy_id: &str, update: EnemyUpdate) {
        let mut inner = self.inner.lock().await;
        inner.enemy_state(player_id, enemy_id, update);
    }

    pub async fn enemy_spawn(&self, player_id: &str, enemy: Enemy) {
        let mut inner = self.inner.lock().await;
        inner.enemy_spawn(player_id, enemy);
    }

    pub async fn enemy_killed(&self, player_id: &str, enemy_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.enemy_killed(player_id, enemy_id);
    }

    pub async fn coin_spawn(&self, player_id: &str, coin: Coin) {
        let mut inner = self.inner.lock().await;
        inner.coin_spawn(player_id, coin);
    }

    pub async fn sync_entities(&self, player_id: &str, enemies: Vec<Enemy>, coins: Vec<Coin>) {
        let mut inner = self.inner.lock().await;
        inner.sync_entities(player_id, enemies, coins);
    }

    pub async fn start_game(&self, player_id: &str) -> Result<(), StartGameError> {
        let mut inner = self.inner.lock().await;
        inner.start_game(player_id)
    }

    pub async fn chat(&self, player_id: &str, message: String) {
        let mut inner = self.inner.lock().await;
        inner.chat(player_id, message);
    }

    pub async fn time_sync(&self, player_id: &str, client_time: f64) {
        let mut inner = self.inner.lock().await;
        inner.time_sync(player_id, client_time);
    }

    /// Lobby-shaped summary for listings and broadcasts.
    pub async fn room_info(&self) -> RoomInfo {
        self.inner.lock().await.room_info()
    }

    /// Full authoritative snapshot.
    pub async fn game_state(&self) -> GameState {
        self.inner.lock().await.game_state()
    }

    /// Drop expired reconnect retentions, then report whether the room has
    /// neither live members nor salvageable disconnected ones.
    pub async fn expire_and_check_deletable(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.expire_stale_disconnects();
        inner.players.is_empty() && inner.disconnected.is_empty()
    }
}

impl RoomInner {
    fn add_player(
        &mut self,
        player_id: &str,
        player_name: &str,
        sender: SessionSender,
    ) -> Result<JoinGrant, JoinError> {
        if self.game_started {
            return Err(JoinError::GameInProgress);
        }
        if self.players.len() >= self.settings.max_players {
            return Err(JoinError::RoomFull);
        }
        if self.players.contains_key(player_id) {
            return Err(JoinError::AlreadyInRoom);
        }

        let player_number = (self.player_order.len() + 1) as u8;
        let player =
            PlayerState::for_slot(player_id.to_string(), player_name.to_string(), player_number);
        let reconnect_token = generate_reconnect_token();

        self.players.insert(player_id.to_string(), player);
        self.connections.insert(player_id.to_string(), sender);
        self.player_order.push(player_id.to_string());
        self.reconnect_tokens
            .insert(player_id.to_string(), reconnect_token.clone());

        let message = ServerMessage::PlayerJoined {
            player_id: player_id.to_string(),
            player_name: player_name.to_string(),
            player_number,
            room_info: self.room_info(),
        };
        self.broadcast(message, None);

        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            player_number,
            "Player joined room"
        );

        Ok(JoinGrant {
            player_number,
            reconnect_token,
            room_info: self.room_info(),
        })
    }

    fn remove_player(&mut self, player_id: &str, allow_reconnect: bool) {
        let Some(player) = self.players.remove(player_id) else {
            self.connections.remove(player_id);
            return;
        };
        let player_name = player.player_name.clone();

        let retained = self.game_started && allow_reconnect;
        if retained {
            self.disconnected
                .insert(player_id.to_string(), DisconnectedPlayer::new(player));
        } else {
            self.player_order.retain(|id| id != player_id);
            self.reconnect_tokens.remove(player_id);
        }
        self.connections.remove(player_id);

        // A departure invalidates the lobby's ready consensus
        if !self.game_started {
            for p in self.players.values_mut() {
                p.is_ready = false;
            }
        }

        if self.host_id == player_id {
            let next_host = self
                .player_order
                .iter()
                .find(|id| self.players.contains_key(id.as_str()))
                .cloned();
            if let Some(new_host) = next_host {
                tracing::info!(
                    room_id = %self.room_id,
                    old_host = %player_id,
                    new_host = %new_host,
                    "Host left, promoting next live member"
                );
                self.host_id = new_host;
            }
        }

        let room_info = self.room_info();
        let message = if retained {
            ServerMessage::PlayerDisconnected {
                player_id: player_id.to_string(),
                player_name,
                can_reconnect: true,
                room_info,
            }
        } else {
            ServerMessage::PlayerLeft {
                player_id: player_id.to_string(),
                player_name,
                can_reconnect: false,
                room_info,
            }
        };
        self.broadcast(message, None);

        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            retained,
            "Player removed from room"
        );
    }

    fn reconnect_player(
        &mut self,
        player_id: &str,
        token: &str,
        sender: SessionSender,
    ) -> Result<ReconnectGrant, ReconnectError> {
        if self.reconnect_tokens.get(player_id).map(String::as_str) != Some(token) {
            return Err(ReconnectError::InvalidToken);
        }

        let window = Duration::seconds(self.settings.reconnect_window_secs as i64);
        let Some(entry) = self.disconnected.get(player_id) else {
            return Err(ReconnectError::NotDisconnected);
        };
        if entry.is_expired(window) {
            self.purge_reconnect_slot(player_id);
            return Err(ReconnectError::WindowExpired);
        }

        let Some(entry) = self.disconnected.remove(player_id) else {
            return Err(ReconnectError::NotDisconnected);
        };
        let player_name = entry.player.player_name.clone();
        self.players.insert(player_id.to_string(), entry.player);
        self.connections.insert(player_id.to_string(), sender);

        let message = ServerMessage::PlayerReconnected {
            player_id: player_id.to_string(),
            player_name,
            room_info: self.room_info(),
        };
        self.broadcast(message, None);

        tracing::info!(room_id = %self.room_id, %player_id, "Player reconnected");

        Ok(ReconnectGrant {
            player_number: self.player_number(player_id),
            game_state: Box::new(self.game_state()),
        })
    }

    /// Forget a disconnected player entirely (expired window).
    fn purge_reconnect_slot(&mut self, player_id: &str) {
        self.disconnected.remove(player_id);
        self.reconnect_tokens.remove(player_id);
        self.player_order.retain(|id| id != player_id);
    }

    fn expire_stale_disconnects(&mut self) {
        let window = Duration::seconds(self.settings.reconnect_window_secs as i64);
        let expired: Vec<PlayerId> = self
            .disconnected
            .iter()
            .filter(|(_, entry)| entry.is_expired(window))
            .map(|(id, _)| id.clone())
            .collect();
        for player_id in expired {
            tracing::info!(room_id = %self.room_id, %player_id, "Reconnect window expired");
            self.purge_reconnect_slot(&player_id);
        }
    }

    fn set_ready(&mut self, player_id: &str, is_ready: bool) {
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        player.is_ready = is_ready;

        let message = ServerMessage::PlayerReadyChanged {
            player_id: player_id.to_string(),
            is_ready,
            room_info: self.room_info(),
        };
        self.broadcast(message, None);
    }

    fn update_player_state(&mut self, player_id: &str, update: PlayerUpdate) {
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        player.apply(&update);

        let message = ServerMessage::PlayerStateUpdate {
            player_id: player_id.to_string(),
            state: update,
        };
        self.broadcast(message, Some(player_id));
    }

    fn game_action(&mut self, player_id: &str, action: String, data: serde_json::Value) {
        let message = ServerMessage::GameAction {
            player_id: player_id.to_string(),
            action: action.clone(),
            data: data.clone(),
        };
        self.broadcast(message, Some(player_id));

        // Host assist relocates the target server-side so every client sees
        // the authoritative position
        if action == "assist" && self.host_id == player_id {
            let assist: AssistData = match serde_json::from_value(data) {
                Ok(assist) => assist,
                Err(err) => {
                    tracing::debug!(room_id = %self.room_id, %err, "Malformed assist payload");
                    return;
                }
            };
            let mut target_id = None;
            if let Some(target) = self.players.get_mut(&assist.target_player_id) {
                target.x = assist.x;
                target.y = assist.y;
                target_id = Some(assist.target_player_id.clone());
            }
            if let Some(target_id) = target_id {
                let message = ServerMessage::PlayerStateUpdate {
                    player_id: target_id,
                    state: PlayerUpdate::position(assist.x, assist.y),
                };
                self.broadcast(message, None);
            }
        }
    }

    fn collect_item(&mut self, player_id: &str, item_type: ItemKind, item_id: String) {
        let first_claim = match item_type {
            ItemKind::Coin => self.collected_coins.insert(item_id.clone()),
            ItemKind::Powerup => self.collected_powerups.insert(item_id.clone()),
        };
        if !first_claim {
            self.send_to_player(player_id, ServerMessage::ItemAlreadyCollected { item_id });
            return;
        }

        if item_type == ItemKind::Coin {
            if let Some(coin) = self.coins.get_mut(&item_id) {
                coin.is_collected = true;
                coin.collected_by = Some(player_id.to_string());
            }
        }

        let (player_coins, player_score) = match self.players.get_mut(player_id) {
            Some(player) => {
                if item_type == ItemKind::Coin {
                    player.coins += 1;
                    player.score += 10;
                }
                (player.coins, player.score)
            }
            None => (0, 0),
        };

        let message = ServerMessage::ItemCollected {
            player_id: player_id.to_string(),
            item_type,
            item_id,
            player_coins,
            player_score,
        };
        self.broadcast(message, None);
    }

    fn enemy_state(&mut self, player_id: &str, enemy_id: &str, update: EnemyUpdate) {
        let Some(enemy) = self.enemies.get_mut(enemy_id) else {
            return;
        };
        // Dead enemies never come back
        if !enemy.is_alive {
            return;
        }
        enemy.apply(&update);

        let message = ServerMessage::EnemyStateUpdate {
            enemy_id: enemy_id.to_string(),
            state: update,
        };
        self.broadcast(message, Some(player_id));
    }

    fn enemy_spawn(&mut self, player_id: &str, mut enemy: Enemy) {
        if self.host_id != player_id {
            return;
        }
        if enemy.enemy_id.is_empty() {
            self.entity_counter += 1;
            enemy.enemy_id = format!("enemy_{}", self.entity_counter);
        }
        enemy.killed_by = None;
        self.enemies.insert(enemy.enemy_id.clone(), enemy.clone());

        self.broadcast(ServerMessage::EnemySpawned { enemy }, None);
    }

    fn enemy_killed(&mut self, player_id: &str, enemy_id: &str) {
        let Some(enemy) = self.enemies.get_mut(enemy_id) else {
            self.send_to_player(
                player_id,
                ServerMessage::EnemyAlreadyDead {
                    enemy_id: enemy_id.to_string(),
                },
            );
            return;
        };
        if !enemy.is_alive {
            self.send_to_player(
                player_id,
                ServerMessage::EnemyAlreadyDead {
                    enemy_id: enemy_id.to_string(),
                },
            );
            return;
        }

        enemy.is_alive = false;
        enemy.state = EnemyBehavior::Dead;
        enemy.health = 0;
        enemy.killed_by = Some(player_id.to_string());
        let snapshot = enemy.clone();

        let message = ServerMessage::EnemyKilled {
            enemy_id: enemy_id.to_string(),
            killed_by: player_id.to_string(),
        };
        self.broadcast(message, None);

        for coin in death_drop_coins(&snapshot) {
            if self.collected_coins.contains(&coin.coin_id) {
                continue;
            }
            self.coins
                .entry(coin.coin_id.clone())
                .or_insert_with(|| coin.clone());
            self.broadcast(ServerMessage::CoinSpawned { coin }, None);
        }
    }

    fn coin_spawn(&mut self, player_id: &str, mut coin: Coin) {
        if self.host_id != player_id {
            return;
        }
        if coin.coin_id.is_empty() {
            self.entity_counter += 1;
            coin.coin_id = format!("coin_{}", self.entity_counter);
        }
        if self.collected_coins.contains(&coin.coin_id) {
            return;
        }
        self.coins.insert(coin.coin_id.clone(), coin.clone());

        self.broadcast(ServerMessage::CoinSpawned { coin }, None);
    }

    fn sync_entities(&mut self, player_id: &str, enemies: Vec<Enemy>, coins: Vec<Coin>) {
        if self.host_id != player_id {
            return;
        }

        self.enemies.clear();
        for mut enemy in enemies {
            if enemy.enemy_id.is_empty() {
                self.entity_counter += 1;
                enemy.enemy_id = format!("enemy_{}", self.entity_counter);
            }
            self.enemies.insert(enemy.enemy_id.clone(), enemy);
        }

        for mut coin in coins {
            if coin.coin_id.is_empty() {
                self.entity_counter += 1;
                coin.coin_id = format!("coin_{}", self.entity_counter);
            }
            if self.collected_coins.contains(&coin.coin_id) {
                continue;
            }
            self.coins.insert(coin.coin_id.clone(), coin);
        }

        let sequence_id = self.next_sequence();
        let message = ServerMessage::EntitiesSync {
            enemies: self.active_enemies(),
            coins: self.uncollected_coins(),
            sequence_id,
        };
        self.broadcast(message, Some(player_id));
    }

    fn start_game(&mut self, player_id: &str) -> Result<(), StartGameError> {
        if self.host_id != player_id {
            return Err(StartGameError::NotHost);
        }
        if self.game_started {
            return Err(StartGameError::AlreadyStarted);
        }
        if self.players.len() < 2 {
            return Err(StartGameError::NotEnoughPlayers { required: 2 });
        }
        if !self.players.values().all(|p| p.is_ready) {
            return Err(StartGameError::NotAllReady);
        }

        self.game_started = true;
        self.game_start_timestamp = Some(server_now_ms() + self.settings.game_start_delay_ms);
        let sequence_id = self.next_sequence();

        tracing::info!(
            room_id = %self.room_id,
            game_start_timestamp = self.game_start_timestamp,
            "Game starting"
        );

        let message = ServerMessage::GameStarting {
            game_state: Box::new(self.game_state()),
            sequence_id,
        };
        self.broadcast(message, None);
        Ok(())
    }

    fn chat(&mut self, player_id: &str, message: String) {
        if !self.game_started {
            return;
        }
        let Some(player) = self.players.get(player_id) else {
            return;
        };

        let entry = ChatEntry {
            player_id: player_id.to_string(),
            player_name: player.player_name.clone(),
            message,
            timestamp: Utc::now().to_rfc3339(),
        };
        self.chat_history.push_back(entry.clone());
        while self.chat_history.len() > self.settings.chat_history_limit {
            self.chat_history.pop_front();
        }

        self.broadcast(ServerMessage::from_chat_entry(&entry), None);
    }

    fn time_sync(&mut self, player_id: &str, client_time: f64) {
        let sequence_id = self.next_sequence();
        self.send_to_player(
            player_id,
            ServerMessage::TimeSyncResponse {
                client_time,
                server_time: server_now_ms(),
                sequence_id,
            },
        );
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence_id += 1;
        self.sequence_id
    }

    fn player_number(&self, player_id: &str) -> u8 {
        self.player_order
            .iter()
            .position(|id| id == player_id)
            .map_or(0, |idx| (idx + 1) as u8)
    }

    fn room_info(&self) -> RoomInfo {
        let players = self
            .player_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(|p| PlayerSummary {
                player_id: p.player_id.clone(),
                player_name: p.player_name.clone(),
                player_number: self.player_number(&p.player_id),
                is_ready: p.is_ready,
                skin: p.skin.clone(),
            })
            .collect();

        RoomInfo {
            room_id: self.room_id.clone(),
            room_name: self.room_name.clone(),
            host_id: self.host_id.clone(),
            player_count: self.players.len(),
            max_players: self.settings.max_players,
            game_started: self.game_started,
            players,
        }
    }

    fn active_enemies(&self) -> Vec<Enemy> {
        let mut enemies: Vec<Enemy> = self
            .enemies
            .values()
            .filter(|e| e.is_alive)
            .cloned()
            .collect();
        enemies.sort_by(|a, b| a.enemy_id.cmp(&b.enemy_id));
        enemies
    }

    fn uncollected_coins(&self) -> Vec<Coin> {
        let mut coins: Vec<Coin> = self
            .coins
            .values()
            .filter(|c| !c.is_collected)
            .cloned()
            .collect();
        coins.sort_by(|a, b| a.coin_id.cmp(&b.coin_id));
        coins
    }

    fn game_state(&self) -> GameState {
        let players: BTreeMap<PlayerId, PlayerSnapshot> = self
            .players
            .values()
            .map(|p| {
                (
                    p.player_id.clone(),
                    PlayerSnapshot {
                        state: p.clone(),
                        player_number: self.player_number(&p.player_id),
                    },
                )
            })
            .collect();

        let mut collected_coins: Vec<String> = self.collected_coins.iter().cloned().collect();
        collected_coins.sort();
        let mut collected_powerups: Vec<String> = self.collected_powerups.iter().cloned().collect();
        collected_powerups.sort();

        GameState {
            seed: self.seed,
            level: self.level,
            game_mode: GAME_MODE.to_string(),
            server_timestamp: server_now_ms(),
            game_start_timestamp: self.game_start_timestamp,
            sequence_id: self.sequence_id,
            players,
            enemies: self.active_enemies(),
            coins: self.uncollected_coins(),
            collected_coins,
            collected_powerups,
            chat_history: self.chat_history.iter().cloned().collect(),
        }
    }

    /// Fan a message out to every connected member except `exclude`.
    ///
    /// Delivery is best-effort: a full queue drops this frame for that
    /// member, a closed channel schedules the member for removal once the
    /// iteration completes.
    fn broadcast(&mut self, message: ServerMessage, exclude: Option<&str>) {
        let message = Arc::new(message);
        let mut failed: Vec<PlayerId> = Vec::new();

        for (player_id, sender) in &self.connections {
            if exclude == Some(player_id.as_str()) {
                continue;
            }
            match sender.try_send(Arc::clone(&message)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        room_id = %self.room_id,
                        %player_id,
                        "Session queue full, dropping broadcast frame"
                    );
                }
                Err(TrySendError::Closed(_)) => failed.push(player_id.clone()),
            }
        }

        for player_id in failed {
            let allow_reconnect = self.game_started;
            self.remove_player(&player_id, allow_reconnect);
        }
    }

    fn send_to_player(&mut self, player_id: &str, message: ServerMessage) {
        let Some(sender) = self.connections.get(player_id) else {
            return;
        };
        match sender.try_send(Arc::new(message)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    room_id = %self.room_id,
                    %player_id,
                    "Session queue full, dropping direct frame"
                );
            }
            Err(TrySendError::Closed(_)) => {
                let allow_reconnect = self.game_started;
                self.remove_player(player_id, allow_reconnect);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> RoomSettings {
        RoomSettings {
            max_players: 2,
            reconnect_window_secs: 60,
            game_start_delay_ms: 500,
            chat_history_limit: 20,
        }
    }

    fn channel() -> (SessionSender, mpsc::Receiver<Arc<ServerMessage>>) {
        mpsc::channel(64)
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<ServerMessage>>) -> Vec<Arc<ServerMessage>> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn room_with_host() -> (
        GameRoom,
        JoinGrant,
        mpsc::Receiver<Arc<ServerMessage>>,
    ) {
        let room = GameRoom::new(
            "ABC234".to_string(),
            "Test Room".to_string(),
            "host".to_string(),
            test_settings(),
        );
        let (tx, rx) = channel();
        let grant = room.add_player("host", "Host", tx).await.unwrap();
        (room, grant, rx)
    }

    async fn full_room() -> (
        GameRoom,
        JoinGrant,
        JoinGrant,
        mpsc::Receiver<Arc<ServerMessage>>,
        mpsc::Receiver<Arc<ServerMessage>>,
    ) {
        let (room, host_grant, host_rx) = room_with_host().await;
        let (tx, client_rx) = channel();
        let client_grant = room.add_player("client", "Client", tx).await.unwrap();
        (room, host_grant, client_grant, host_rx, client_rx)
    }

    async fn started_room() -> (
        GameRoom,
        mpsc::Receiver<Arc<ServerMessage>>,
        mpsc::Receiver<Arc<ServerMessage>>,
    ) {
        let (room, _, _, mut host_rx, mut client_rx) = full_room().await;
        room.set_ready("host", true).await;
        room.set_ready("client", true).await;
        room.start_game("host").await.unwrap();
        drain(&mut host_rx);
        drain(&mut client_rx);
        (room, host_rx, client_rx)
    }

    fn host_enemy(id: &str, x: f64, y: f64, coin_reward: u32) -> Enemy {
        serde_json::from_value(serde_json::json!({
            "enemy_id": id,
            "enemy_type": "slimeGreen",
            "x": x,
            "y": y,
            "health": 10,
            "max_health": 10,
            "coin_reward": coin_reward
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_join_order_assigns_slots() {
        let (_room, host_grant, client_grant, _h, _c) = full_room().await;
        assert_eq!(host_grant.player_number, 1);
        assert_eq!(client_grant.player_number, 2);
        assert_eq!(client_grant.room_info.player_count, 2);
        assert_eq!(client_grant.room_info.players[0].skin, "alienGreen");
        assert_eq!(client_grant.room_info.players[1].skin, "alienPink");
    }

    #[tokio::test]
    async fn test_join_full_room_fails() {
        let (room, _, _, _h, _c) = full_room().await;
        let (tx, _rx) = channel();
        assert_eq!(
            room.add_player("third", "Third", tx).await.unwrap_err(),
            JoinError::RoomFull
        );
    }

    #[tokio::test]
    async fn test_join_after_start_fails() {
        let (room, _h, _c) = started_room().await;
        room.leave("client").await;
        let (tx, _rx) = channel();
        assert_eq!(
            room.add_player("third", "Third", tx).await.unwrap_err(),
            JoinError::GameInProgress
        );
    }

    #[tokio::test]
    async fn test_duplicate_player_id_rejected() {
        let (room, _grant, _rx) = room_with_host().await;
        let (tx, _rx2) = channel();
        assert_eq!(
            room.add_player("host", "Imposter", tx).await.unwrap_err(),
            JoinError::AlreadyInRoom
        );
    }

    #[tokio::test]
    async fn test_start_game_requires_host_full_ready_lobby() {
        let (room, _grant, _rx) = room_with_host().await;
        assert_eq!(
            room.start_game("host").await.unwrap_err(),
            StartGameError::NotEnoughPlayers { required: 2 }
        );

        let (tx, _client_rx) = channel();
        room.add_player("client", "Client", tx).await.unwrap();
        assert_eq!(
            room.start_game("client").await.unwrap_err(),
            StartGameError::NotHost
        );
        assert_eq!(
            room.start_game("host").await.unwrap_err(),
            StartGameError::NotAllReady
        );

        room.set_ready("host", true).await;
        room.set_ready("client", true).await;
        room.start_game("host").await.unwrap();
        assert_eq!(
            room.start_game("host").await.unwrap_err(),
            StartGameError::AlreadyStarted
        );
    }

    #[tokio::test]
    async fn test_game_starting_carries_timestamp_and_sequence() {
        let (room, _, _, mut host_rx, mut client_rx) = full_room().await;
        room.set_ready("host", true).await;
        room.set_ready("client", true).await;

        let before = server_now_ms();
        room.start_game("host").await.unwrap();

        let mut seen = None;
        for rx in [&mut host_rx, &mut client_rx] {
            let starting = drain(rx)
                .into_iter()
                .find(|m| matches!(&**m, ServerMessage::GameStarting { .. }))
                .expect("game_starting broadcast");
            if let ServerMessage::GameStarting {
                game_state,
                sequence_id,
            } = &*starting
            {
                let ts = game_state.game_start_timestamp.unwrap();
                assert!(ts >= before + 500, "start timestamp not 500ms out");
                assert!((1..=999_999).contains(&game_state.seed));
                assert_eq!(game_state.players.len(), 2);
                assert_eq!(game_state.game_mode, "online_coop");
                match seen {
                    None => seen = Some((*sequence_id, ts)),
                    Some(prev) => assert_eq!(prev, (*sequence_id, ts)),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_collect_item_single_flight() {
        let (room, mut host_rx, mut client_rx) = started_room().await;

        room.collect_item("host", ItemKind::Coin, "coin_7".to_string())
            .await;
        room.collect_item("client", ItemKind::Coin, "coin_7".to_string())
            .await;

        let host_msgs = drain(&mut host_rx);
        let winner = host_msgs
            .iter()
            .find_map(|m| match &**m {
                ServerMessage::ItemCollected {
                    player_id,
                    player_coins,
                    player_score,
                    ..
                } => Some((player_id.clone(), *player_coins, *player_score)),
                _ => None,
            })
            .expect("item_collected broadcast");
        assert_eq!(winner, ("host".to_string(), 1, 10));

        let client_msgs = drain(&mut client_rx);
        assert!(client_msgs.iter().any(|m| matches!(
            &**m,
            ServerMessage::ItemAlreadyCollected { item_id } if item_id == "coin_7"
        )));
        // the loser never triggers a second broadcast
        assert_eq!(
            client_msgs
                .iter()
                .filter(|m| matches!(&***m, ServerMessage::ItemCollected { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_collect_updates_coin_record() {
        let (room, _h, _c) = started_room().await;
        room.coin_spawn(
            "host",
            serde_json::from_value(serde_json::json!({"coin_id": "c1", "x": 5, "y": 6})).unwrap(),
        )
        .await;
        room.collect_item("client", ItemKind::Coin, "c1".to_string())
            .await;

        let state = room.game_state().await;
        assert!(state.coins.is_empty(), "collected coin still listed");
        assert_eq!(state.collected_coins, vec!["c1".to_string()]);
        assert_eq!(state.players["client"].state.coins, 1);
        assert_eq!(state.players["client"].state.score, 10);
    }

    #[tokio::test]
    async fn test_enemy_kill_single_flight_with_drops() {
        let (room, mut host_rx, mut client_rx) = started_room().await;
        room.enemy_spawn("host", host_enemy("e1", 100.0, 300.0, 3))
            .await;

        room.enemy_killed("client", "e1").await;
        room.enemy_killed("host", "e1").await;

        let client_msgs = drain(&mut client_rx);
        assert!(client_msgs.iter().any(|m| matches!(
            &**m,
            ServerMessage::EnemyKilled { enemy_id, killed_by }
                if enemy_id == "e1" && killed_by == "client"
        )));
        let drop_ids: Vec<String> = client_msgs
            .iter()
            .filter_map(|m| match &**m {
                ServerMessage::CoinSpawned { coin } => Some(coin.coin_id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            drop_ids,
            ["coin_drop_100_300_0", "coin_drop_100_300_1", "coin_drop_100_300_2"]
        );

        // losing kill report answers only the sender
        let host_msgs = drain(&mut host_rx);
        assert!(host_msgs.iter().any(|m| matches!(
            &**m,
            ServerMessage::EnemyAlreadyDead { enemy_id } if enemy_id == "e1"
        )));
        assert_eq!(
            host_msgs
                .iter()
                .filter(|m| matches!(&***m, ServerMessage::EnemyKilled { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_dead_enemy_state_updates_are_ignored() {
        let (room, _h, mut client_rx) = started_room().await;
        room.enemy_spawn("host", host_enemy("e1", 10.0, 10.0, 0))
            .await;
        room.enemy_killed("host", "e1").await;
        drain(&mut client_rx);

        let update = EnemyUpdate {
            is_alive: Some(true),
            health: Some(10),
            ..EnemyUpdate::default()
        };
        room.enemy_state("host", "e1", update).await;

        assert!(drain(&mut client_rx).is_empty());
        assert!(room.game_state().await.enemies.is_empty());
    }

    #[tokio::test]
    async fn test_non_host_spawns_are_silently_dropped() {
        let (room, mut host_rx, _c) = started_room().await;
        room.enemy_spawn("client", host_enemy("e1", 0.0, 0.0, 0))
            .await;
        room.coin_spawn(
            "client",
            serde_json::from_value(serde_json::json!({"coin_id": "c1"})).unwrap(),
        )
        .await;
        room.sync_entities("client", vec![host_enemy("e2", 0.0, 0.0, 0)], vec![])
            .await;

        assert!(drain(&mut host_rx).is_empty());
        let state = room.game_state().await;
        assert!(state.enemies.is_empty());
        assert!(state.coins.is_empty());
    }

    #[tokio::test]
    async fn test_sync_entities_skips_collected_coins() {
        let (room, _h, mut client_rx) = started_room().await;
        room.collect_item("host", ItemKind::Coin, "old".to_string())
            .await;
        drain(&mut client_rx);

        let coins = vec![
            serde_json::from_value(serde_json::json!({"coin_id": "old", "x": 1, "y": 1})).unwrap(),
            serde_json::from_value(serde_json::json!({"coin_id": "new", "x": 2, "y": 2})).unwrap(),
        ];
        room.sync_entities("host", vec![host_enemy("e1", 0.0, 0.0, 0)], coins)
            .await;

        let sync = drain(&mut client_rx)
            .into_iter()
            .find(|m| matches!(&**m, ServerMessage::EntitiesSync { .. }))
            .expect("entities_sync broadcast");
        if let ServerMessage::EntitiesSync {
            enemies,
            coins,
            sequence_id,
        } = &*sync
        {
            assert_eq!(enemies.len(), 1);
            assert_eq!(coins.len(), 1);
            assert_eq!(coins[0].coin_id, "new");
            assert!(*sequence_id > 0);
        }
    }

    #[tokio::test]
    async fn test_leave_in_lobby_resets_ready_flags() {
        let (room, _, _, mut host_rx, _client_rx) = full_room().await;
        room.set_ready("host", true).await;
        room.set_ready("client", true).await;
        drain(&mut host_rx);

        room.leave("client").await;

        let left = drain(&mut host_rx)
            .into_iter()
            .find(|m| matches!(&**m, ServerMessage::PlayerLeft { .. }))
            .expect("player_left broadcast");
        if let ServerMessage::PlayerLeft {
            can_reconnect,
            room_info,
            ..
        } = &*left
        {
            assert!(!can_reconnect);
            assert_eq!(room_info.player_count, 1);
            assert!(!room_info.players[0].is_ready, "host ready flag not reset");
        }

        assert_eq!(
            room.start_game("host").await.unwrap_err(),
            StartGameError::NotEnoughPlayers { required: 2 }
        );
    }

    #[tokio::test]
    async fn test_mid_game_disconnect_retains_slot_for_reconnect() {
        let (room, mut host_rx, _client_rx) = started_room().await;

        room.disconnect("client").await;

        let msgs = drain(&mut host_rx);
        assert!(msgs.iter().any(|m| matches!(
            &**m,
            ServerMessage::PlayerDisconnected { player_id, can_reconnect: true, .. }
                if player_id == "client"
        )));

        assert!(!room.expire_and_check_deletable().await);
    }

    #[tokio::test]
    async fn test_reconnect_restores_slot_and_state() {
        let (room, _, client_grant, mut host_rx, mut client_rx) = full_room().await;
        room.set_ready("host", true).await;
        room.set_ready("client", true).await;
        room.start_game("host").await.unwrap();
        room.update_player_state(
            "client",
            PlayerUpdate {
                score: Some(70),
                ..PlayerUpdate::default()
            },
        )
        .await;
        drain(&mut host_rx);
        drain(&mut client_rx);

        room.disconnect("client").await;

        let (tx, _new_rx) = channel();
        let grant = room
            .reconnect_player("client", &client_grant.reconnect_token, tx)
            .await
            .unwrap();

        assert_eq!(grant.player_number, 2, "slot must survive the round trip");
        assert_eq!(grant.game_state.players["client"].state.score, 70);

        let msgs = drain(&mut host_rx);
        assert!(msgs
            .iter()
            .any(|m| matches!(&**m, ServerMessage::PlayerDisconnected { .. })));
        assert!(msgs
            .iter()
            .any(|m| matches!(&**m, ServerMessage::PlayerReconnected { .. })));
    }

    #[tokio::test]
    async fn test_reconnect_rejects_bad_token() {
        let (room, _host_rx, _client_rx) = started_room().await;
        room.disconnect("client").await;

        let (tx, _rx) = channel();
        assert_eq!(
            room.reconnect_player("client", "forged", tx)
                .await
                .unwrap_err(),
            ReconnectError::InvalidToken
        );
    }

    #[tokio::test]
    async fn test_reconnect_rejects_expired_window() {
        let room = GameRoom::new(
            "ABC234".to_string(),
            "Test Room".to_string(),
            "host".to_string(),
            RoomSettings {
                reconnect_window_secs: 0,
                ..test_settings()
            },
        );
        let (tx, _host_rx) = channel();
        room.add_player("host", "Host", tx).await.unwrap();
        let (tx, _client_rx) = channel();
        let grant = room.add_player("client", "Client", tx).await.unwrap();
        room.set_ready("host", true).await;
        room.set_ready("client", true).await;
        room.start_game("host").await.unwrap();

        room.disconnect("client").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let (tx, _rx) = channel();
        assert_eq!(
            room.reconnect_player("client", &grant.reconnect_token, tx)
                .await
                .unwrap_err(),
            ReconnectError::WindowExpired
        );

        // the purged slot no longer honors the token
        let (tx, _rx) = channel();
        assert_eq!(
            room.reconnect_player("client", &grant.reconnect_token, tx)
                .await
                .unwrap_err(),
            ReconnectError::InvalidToken
        );
    }

    #[tokio::test]
    async fn test_host_promotion_prefers_live_members() {
        let (room, _host_rx, mut client_rx) = started_room().await;

        room.disconnect("host").await;

        let msgs = drain(&mut client_rx);
        let info = msgs
            .iter()
            .find_map(|m| match &**m {
                ServerMessage::PlayerDisconnected { room_info, .. } => Some(room_info.clone()),
                _ => None,
            })
            .expect("player_disconnected broadcast");
        assert_eq!(info.host_id, "client", "first live member becomes host");
    }

    #[tokio::test]
    async fn test_sequence_ids_strictly_increase() {
        let (room, mut host_rx, _client_rx) = started_room().await;

        room.time_sync("host", 1.0).await;
        room.time_sync("host", 2.0).await;
        room.sync_entities("host", vec![], vec![]).await;
        room.time_sync("host", 3.0).await;

        let seqs: Vec<u64> = drain(&mut host_rx)
            .iter()
            .filter_map(|m| match &**m {
                ServerMessage::TimeSyncResponse { sequence_id, .. } => Some(*sequence_id),
                _ => None,
            })
            .collect();
        assert_eq!(seqs.len(), 3);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_chat_only_after_start_and_ring_is_bounded() {
        let room = GameRoom::new(
            "ABC234".to_string(),
            "Test Room".to_string(),
            "host".to_string(),
            RoomSettings {
                chat_history_limit: 3,
                ..test_settings()
            },
        );
        let (tx, mut host_rx) = channel();
        room.add_player("host", "Host", tx).await.unwrap();
        let (tx, _client_rx) = channel();
        room.add_player("client", "Client", tx).await.unwrap();

        room.chat("host", "too early".to_string()).await;
        assert!(!drain(&mut host_rx)
            .iter()
            .any(|m| matches!(&**m, ServerMessage::Chat { .. })));

        room.set_ready("host", true).await;
        room.set_ready("client", true).await;
        room.start_game("host").await.unwrap();
        for i in 0..5 {
            room.chat("host", format!("msg {i}")).await;
        }

        let history = room.game_state().await.chat_history;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message, "msg 2");
        assert_eq!(history[2].message, "msg 4");
    }

    #[tokio::test]
    async fn test_assist_applies_only_for_host() {
        let (room, mut host_rx, mut client_rx) = started_room().await;

        room.game_action(
            "host",
            "assist".to_string(),
            serde_json::json!({"target_player_id": "client", "x": 250.0, "y": 80.0}),
        )
        .await;

        // non-host sees the relayed action and the authoritative update
        let client_msgs = drain(&mut client_rx);
        assert!(client_msgs.iter().any(|m| matches!(
            &**m,
            ServerMessage::GameAction { action, .. } if action == "assist"
        )));
        assert!(client_msgs.iter().any(|m| matches!(
            &**m,
            ServerMessage::PlayerStateUpdate { player_id, state }
                if player_id == "client" && state.x == Some(250.0) && state.y == Some(80.0)
        )));
        // the host only sees the state update (actions are relayed to others)
        let host_msgs = drain(&mut host_rx);
        assert!(!host_msgs
            .iter()
            .any(|m| matches!(&**m, ServerMessage::GameAction { .. })));
        assert!(host_msgs
            .iter()
            .any(|m| matches!(&**m, ServerMessage::PlayerStateUpdate { .. })));

        let state = room.game_state().await;
        assert_eq!(state.players["client"].state.x, 250.0);
        assert_eq!(state.players["client"].state.y, 80.0);

        // a non-host assist relays the action but never mutates
        room.game_action(
            "client",
            "assist".to_string(),
            serde_json::json!({"target_player_id": "host", "x": 1.0, "y": 1.0}),
        )
        .await;
        let state = room.game_state().await;
        assert_ne!(state.players["host"].state.x, 1.0);
    }

    #[tokio::test]
    async fn test_broadcast_prunes_closed_sessions() {
        let (room, _, _, mut host_rx, client_rx) = full_room().await;
        drop(client_rx);
        drain(&mut host_rx);

        room.set_ready("host", true).await;

        let msgs = drain(&mut host_rx);
        assert!(msgs.iter().any(|m| matches!(
            &**m,
            ServerMessage::PlayerLeft { player_id, .. } if player_id == "client"
        )));
        assert_eq!(room.room_info().await.player_count, 1);
    }

    #[tokio::test]
    async fn test_player_state_update_excludes_sender() {
        let (room, mut host_rx, mut client_rx) = started_room().await;

        room.update_player_state(
            "client",
            PlayerUpdate {
                x: Some(10.0),
                ..PlayerUpdate::default()
            },
        )
        .await;

        assert!(drain(&mut host_rx)
            .iter()
            .any(|m| matches!(&**m, ServerMessage::PlayerStateUpdate { .. })));
        assert!(!drain(&mut client_rx)
            .iter()
            .any(|m| matches!(&**m, ServerMessage::PlayerStateUpdate { .. })));
    }
}
