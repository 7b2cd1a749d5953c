//! Room and session state management.
//!
//! A [`registry::RoomRegistry`] owns every live [`state::GameRoom`]; each
//! room serializes its own mutation behind one async mutex. Reconnection
//! retention and the deterministic death-drop synthesis live in their own
//! submodules.

pub mod drops;
pub mod error;
pub mod reconnect;
pub mod registry;
pub mod state;

pub use error::{JoinError, ReconnectError, StartGameError};

pub use registry::RoomRegistry;

pub use state::{GameRoom, JoinGrant, ReconnectGrant, RoomSettings, SessionSender};
