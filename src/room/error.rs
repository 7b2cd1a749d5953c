use thiserror::Error;

/// Why a join attempt was refused. The `Display` text is sent verbatim to
/// the client as the `error` message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    GameInProgress,
    #[error("Player is already in the room")]
    AlreadyInRoom,
}

/// Why a `start_game` request was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartGameError {
    #[error("Only the host can start the game")]
    NotHost,
    #[error("Game has already started")]
    AlreadyStarted,
    #[error("Need at least {required} players to start")]
    NotEnoughPlayers { required: usize },
    #[error("All players must be ready")]
    NotAllReady,
}

/// Why a reconnection attempt was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconnectError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Invalid reconnect token")]
    InvalidToken,
    #[error("Reconnect window has expired")]
    WindowExpired,
    #[error("No reconnectable slot for this player")]
    NotDisconnected,
}
