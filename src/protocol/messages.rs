use serde::{Deserialize, Serialize};

use super::types::{
    ChatEntry, Coin, Enemy, EnemyUpdate, GameState, ItemKind, PlayerId, PlayerUpdate, RoomId,
    RoomInfo,
};

/// Message types sent from client to server.
///
/// Frames whose `type` tag does not match any variant are dropped by the
/// dispatcher without a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a room; the sender becomes host with slot 1
    CreateRoom {
        /// Display name for the lobby listing; defaults to "<player_name>'s Room"
        #[serde(default, alias = "room_name")]
        name: Option<String>,
        player_id: PlayerId,
        player_name: String,
    },
    /// Join an existing room by its 6-character code
    JoinRoom {
        /// Falls back to the code in the endpoint path when absent
        #[serde(default)]
        room_id: Option<RoomId>,
        player_id: PlayerId,
        player_name: String,
    },
    /// Set own lobby ready flag
    PlayerReady { is_ready: bool },
    /// Apply a partial update to the sender's own player record
    PlayerState { state: PlayerUpdate },
    /// Relay a gameplay action; `assist` from the host is applied server-side
    GameAction {
        action: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Claim a collectible; first claim per id wins
    CollectItem {
        item_type: ItemKind,
        item_id: String,
    },
    /// Update an enemy record
    EnemyState {
        enemy_id: String,
        state: EnemyUpdate,
    },
    /// Register an enemy (host only)
    EnemySpawn { enemy: Enemy },
    /// Report an enemy kill; first report per id wins
    EnemyKilled { enemy_id: String },
    /// Register a coin (host only)
    CoinSpawn { coin: Coin },
    /// Replace the authoritative entity registries (host only)
    SyncEntities {
        #[serde(default)]
        enemies: Vec<Enemy>,
        #[serde(default)]
        coins: Vec<Coin>,
    },
    /// Resume a mid-game slot after an involuntary disconnect
    Reconnect {
        #[serde(default)]
        room_id: Option<RoomId>,
        player_id: PlayerId,
        /// Token issued in `room_created` / `room_joined`
        token: String,
    },
    /// Start the game (host only; requires a full, ready lobby)
    StartGame,
    /// In-game chat message
    Chat { message: String },
    /// Leave the room without reconnection retention
    LeaveRoom,
    /// Heartbeat to maintain connection
    Ping,
    /// Clock-sync probe
    TimeSync { client_time: f64 },
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room created; the sender is host
    RoomCreated {
        room_id: RoomId,
        player_id: PlayerId,
        player_number: u8,
        /// Pre-issued token accepted by a later `reconnect`
        reconnect_token: String,
        room_info: RoomInfo,
    },
    /// Successfully joined a room
    RoomJoined {
        room_id: RoomId,
        player_id: PlayerId,
        player_number: u8,
        /// Pre-issued token accepted by a later `reconnect`
        reconnect_token: String,
        room_info: RoomInfo,
    },
    /// A player joined the room
    PlayerJoined {
        player_id: PlayerId,
        player_name: String,
        player_number: u8,
        room_info: RoomInfo,
    },
    /// A player left for good (no reconnection retention)
    PlayerLeft {
        player_id: PlayerId,
        player_name: String,
        can_reconnect: bool,
        room_info: RoomInfo,
    },
    /// A player dropped mid-game and may reconnect within the grace window
    PlayerDisconnected {
        player_id: PlayerId,
        player_name: String,
        can_reconnect: bool,
        room_info: RoomInfo,
    },
    /// A disconnected player resumed their slot
    PlayerReconnected {
        player_id: PlayerId,
        player_name: String,
        room_info: RoomInfo,
    },
    /// A player's lobby ready flag changed
    PlayerReadyChanged {
        player_id: PlayerId,
        is_ready: bool,
        room_info: RoomInfo,
    },
    /// Another player's state changed
    PlayerStateUpdate {
        player_id: PlayerId,
        state: PlayerUpdate,
    },
    /// Relayed gameplay action
    GameAction {
        player_id: PlayerId,
        action: String,
        data: serde_json::Value,
    },
    /// Collection succeeded; totals are authoritative
    ItemCollected {
        player_id: PlayerId,
        item_type: ItemKind,
        item_id: String,
        player_coins: u32,
        player_score: i64,
    },
    /// Collection lost the race (sender only)
    ItemAlreadyCollected { item_id: String },
    /// An enemy was registered
    EnemySpawned { enemy: Enemy },
    /// An enemy's state changed
    EnemyStateUpdate {
        enemy_id: String,
        state: EnemyUpdate,
    },
    /// An enemy died; death-drop coins follow as `coin_spawned`
    EnemyKilled {
        enemy_id: String,
        killed_by: PlayerId,
    },
    /// Kill report lost the race (sender only)
    EnemyAlreadyDead { enemy_id: String },
    /// A coin was registered
    CoinSpawned { coin: Coin },
    /// Authoritative entity snapshot for non-host members
    EntitiesSync {
        enemies: Vec<Enemy>,
        coins: Vec<Coin>,
        sequence_id: u64,
    },
    /// Game is starting; clients schedule against `game_start_timestamp`
    /// (boxed to reduce enum size)
    GameStarting {
        game_state: Box<GameState>,
        sequence_id: u64,
    },
    /// Reconnection successful (boxed to reduce enum size)
    Reconnected {
        room_id: RoomId,
        player_id: PlayerId,
        player_number: u8,
        game_state: Box<GameState>,
    },
    /// Successfully left the room
    RoomLeft,
    /// Chat message with server-assigned timestamp
    Chat {
        player_id: PlayerId,
        player_name: String,
        message: String,
        timestamp: String,
    },
    /// Pong response to ping
    Pong,
    /// Clock-sync reply
    TimeSyncResponse {
        client_time: f64,
        /// Server time in milliseconds since the Unix epoch
        server_time: i64,
        sequence_id: u64,
    },
    /// Human-readable error
    Error { message: String },
}

impl ServerMessage {
    /// Chat entries are stored once and replayed on reconnect; this adapts
    /// a ring entry back into its broadcast form.
    pub fn from_chat_entry(entry: &ChatEntry) -> Self {
        Self::Chat {
            player_id: entry.player_id.clone(),
            player_name: entry.player_name.clone(),
            message: entry.message.clone(),
            timestamp: entry.timestamp.clone(),
        }
    }
}
