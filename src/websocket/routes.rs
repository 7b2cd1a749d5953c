use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::protocol::RoomInfo;
use crate::server::GameServer;

use super::connection::websocket_handler;

/// Create the Axum router: the room WebSocket endpoint plus the lobby and
/// health side channels.
pub fn create_router(cors_origins: &str) -> axum::Router<Arc<GameServer>> {
    axum::Router::new()
        .route("/ws/room/{room_id}", get(websocket_handler))
        .route("/api/rooms", get(available_rooms))
        .route("/api/rooms/all", get(all_rooms))
        .route("/health", get(health))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer from the configured comma-separated origin list.
/// `*`, an empty list, or a list with no parseable entry all degrade to
/// permissive mode.
fn cors_layer(origins: &str) -> CorsLayer {
    if origins.trim() == "*" {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!(%origins, "No usable CORS origin in config, allowing all");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Joinable rooms: not started and with a free slot.
async fn available_rooms(State(server): State<Arc<GameServer>>) -> Json<Vec<RoomInfo>> {
    Json(server.list_available_rooms().await)
}

/// Every room, joinable or not.
async fn all_rooms(State(server): State<Arc<GameServer>>) -> Json<Vec<RoomInfo>> {
    Json(server.list_all_rooms().await)
}

/// Liveness probe.
async fn health(State(server): State<Arc<GameServer>>) -> impl IntoResponse {
    if server.health_check().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    }
}
