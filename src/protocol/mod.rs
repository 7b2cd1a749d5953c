//! WebSocket message protocol.
//!
//! Every frame is one JSON object with a `type` discriminator and flat
//! payload fields. Inbound messages form a closed set; frames with an
//! unknown `type` are dropped without a reply. The outbound catalog is
//! exhaustive.

pub mod messages;
pub mod room_codes;
pub mod types;

pub use messages::{ClientMessage, ServerMessage};

pub use room_codes::{generate_room_code, is_valid_room_code, ROOM_CODE_LENGTH};

pub use types::{
    ChatEntry, Coin, Enemy, EnemyBehavior, EnemyUpdate, GameState, ItemKind, PlayerId,
    PlayerSnapshot, PlayerState, PlayerSummary, PlayerUpdate, RoomId, RoomInfo,
};
