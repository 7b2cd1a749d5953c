#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # JumpJump Server
//!
//! Authoritative in-memory WebSocket room server for a 2-player cooperative
//! platformer.
//!
//! Zero external services — no database, no cloud dependencies. Run the
//! binary and connect via WebSocket at `/ws/room/{room_id}`.

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// WebSocket message protocol definitions
pub mod protocol;

/// Room state, registry and reconnection support
pub mod room;

/// Main server orchestration
pub mod server;

/// WebSocket connection handling
pub mod websocket;
