use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque player identifier supplied by the client (frontends mint
/// 16-hex-char ids; the server treats the value as opaque).
pub type PlayerId = String;
/// 6-character room code from the reduced alphabet.
pub type RoomId = String;

/// Default skin for the slot-1 player.
pub const SLOT_ONE_SKIN: &str = "alienGreen";
/// Default skin for the slot-2 player.
pub const SLOT_TWO_SKIN: &str = "alienPink";
/// Default weapon for every fresh player.
pub const DEFAULT_WEAPON: &str = "raygun";

/// Collectible item category for single-flight collection tracking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Coin,
    Powerup,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coin => f.write_str("coin"),
            Self::Powerup => f.write_str("powerup"),
        }
    }
}

/// A player's live state within a room.
///
/// Field names are part of the wire contract (they appear verbatim in
/// `player_state_update` payloads and game-state snapshots).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub player_name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub velocity_x: f64,
    #[serde(default)]
    pub velocity_y: f64,
    #[serde(default = "default_health")]
    pub health: i32,
    #[serde(default = "default_lives")]
    pub lives: i32,
    #[serde(default)]
    pub score: i64,
    pub skin: String,
    pub weapon: String,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default = "default_true")]
    pub facing_right: bool,
    #[serde(default)]
    pub is_jumping: bool,
    #[serde(default)]
    pub is_shooting: bool,
    /// Current checkpoint index
    #[serde(default)]
    pub checkpoint: u32,
    /// Collected coins
    #[serde(default)]
    pub coins: u32,
}

impl PlayerState {
    /// Create a fresh player for the given slot (1-based join order).
    pub fn for_slot(player_id: PlayerId, player_name: String, slot: u8) -> Self {
        let (x, skin) = if slot == 1 {
            (400.0, SLOT_ONE_SKIN)
        } else {
            (500.0, SLOT_TWO_SKIN)
        };
        Self {
            player_id,
            player_name,
            x,
            y: 550.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            health: default_health(),
            lives: default_lives(),
            score: 0,
            skin: skin.to_string(),
            weapon: DEFAULT_WEAPON.to_string(),
            is_alive: true,
            is_ready: false,
            facing_right: true,
            is_jumping: false,
            is_shooting: false,
            checkpoint: 0,
            coins: 0,
        }
    }

    pub fn apply(&mut self, update: &PlayerUpdate) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(velocity_x) = update.velocity_x {
            self.velocity_x = velocity_x;
        }
        if let Some(velocity_y) = update.velocity_y {
            self.velocity_y = velocity_y;
        }
        if let Some(health) = update.health {
            self.health = health;
        }
        if let Some(lives) = update.lives {
            self.lives = lives;
        }
        if let Some(score) = update.score {
            self.score = score;
        }
        if let Some(coins) = update.coins {
            self.coins = coins;
        }
        if let Some(checkpoint) = update.checkpoint {
            self.checkpoint = checkpoint;
        }
        if let Some(weapon) = &update.weapon {
            self.weapon = weapon.clone();
        }
        if let Some(is_alive) = update.is_alive {
            self.is_alive = is_alive;
        }
        if let Some(facing_right) = update.facing_right {
            self.facing_right = facing_right;
        }
        if let Some(is_jumping) = update.is_jumping {
            self.is_jumping = is_jumping;
        }
        if let Some(is_shooting) = update.is_shooting {
            self.is_shooting = is_shooting;
        }
    }
}

/// Partial player-state update as sent by clients (`player_state`) and
/// echoed to the other members (`player_state_update`).
///
/// Absent fields leave the corresponding record field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lives: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing_right: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_jumping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_shooting: Option<bool>,
}

impl PlayerUpdate {
    /// Update carrying only a position, used for host `assist` relocation.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}

/// Enemy behavior tag as reported by the host simulation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnemyBehavior {
    #[default]
    Idle,
    Moving,
    Attacking,
    Dead,
}

/// An enemy record.
///
/// The host supplies `enemy_id`; when absent the server mints an
/// `enemy_<n>` id from the room's entity counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    #[serde(default)]
    pub enemy_id: String,
    #[serde(default)]
    pub enemy_type: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub velocity_x: f64,
    #[serde(default)]
    pub velocity_y: f64,
    #[serde(default = "default_enemy_health")]
    pub health: i32,
    #[serde(default = "default_enemy_health")]
    pub max_health: i32,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    #[serde(default = "default_true")]
    pub facing_right: bool,
    #[serde(default)]
    pub state: EnemyBehavior,
    /// Coins synthesized server-side when this enemy dies
    #[serde(default)]
    pub coin_reward: u32,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killed_by: Option<PlayerId>,
}

/// Partial enemy-state update (`enemy_state` / `enemy_state_update`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnemyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing_right: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<EnemyBehavior>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl Enemy {
    pub fn apply(&mut self, update: &EnemyUpdate) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(velocity_x) = update.velocity_x {
            self.velocity_x = velocity_x;
        }
        if let Some(velocity_y) = update.velocity_y {
            self.velocity_y = velocity_y;
        }
        if let Some(health) = update.health {
            self.health = health;
        }
        if let Some(is_alive) = update.is_alive {
            self.is_alive = is_alive;
        }
        if let Some(facing_right) = update.facing_right {
            self.facing_right = facing_right;
        }
        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(scale) = update.scale {
            self.scale = scale;
        }
    }
}

/// A coin record.
///
/// Ids are host-supplied, server-minted (`coin_<n>`), or deterministic
/// death-drop ids (`coin_drop_<ex>_<ey>_<i>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    #[serde(default)]
    pub coin_id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub velocity_x: f64,
    #[serde(default)]
    pub velocity_y: f64,
    #[serde(default)]
    pub is_collected: bool,
    #[serde(default)]
    pub collected_by: Option<PlayerId>,
    #[serde(default = "default_coin_value")]
    pub value: u32,
}

/// One retained chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub message: String,
    /// ISO 8601 timestamp assigned by the server
    pub timestamp: String,
}

/// Per-player entry in lobby-shaped room info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub player_name: String,
    pub player_number: u8,
    pub is_ready: bool,
    pub skin: String,
}

/// Lobby-shaped room description used in join/leave/ready broadcasts and
/// the HTTP room listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub room_name: String,
    pub host_id: PlayerId,
    pub player_count: usize,
    pub max_players: usize,
    pub game_started: bool,
    pub players: Vec<PlayerSummary>,
}

/// A player's full state plus its slot, as carried in game-state snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    #[serde(flatten)]
    pub state: PlayerState,
    pub player_number: u8,
}

/// Full game snapshot sent on `game_starting` and `reconnected`.
///
/// The server is authoritative for every field; clients reconcile their
/// local clocks against `server_timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub seed: u32,
    pub level: u32,
    pub game_mode: String,
    /// Current server time in milliseconds since the Unix epoch
    pub server_timestamp: i64,
    /// Wall-clock instant (ms) at which clients schedule simulation start
    pub game_start_timestamp: Option<i64>,
    pub sequence_id: u64,
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    /// Enemies still alive
    pub enemies: Vec<Enemy>,
    /// Coins not yet collected
    pub coins: Vec<Coin>,
    pub collected_coins: Vec<String>,
    pub collected_powerups: Vec<String>,
    /// Chat tail (bounded ring, last 20)
    pub chat_history: Vec<ChatEntry>,
}

fn default_health() -> i32 {
    100
}

fn default_lives() -> i32 {
    3
}

fn default_enemy_health() -> i32 {
    1
}

fn default_scale() -> f64 {
    1.0
}

fn default_coin_value() -> u32 {
    1
}

fn default_true() -> bool {
    true
}
