//! WebSocket connection handling and HTTP routes.

mod connection;
mod dispatcher;
mod routes;

pub use routes::create_router;
