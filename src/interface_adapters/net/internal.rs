use crate::domain::WorldMode;
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::net::client::spawn_world_serializer;
use crate::interface_adapters::state::AppState;
use crate::use_cases::WorldError;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

#[derive(Debug, serde::Deserialize)]
pub struct WorldInitRequest {
    // World id chosen by the caller; clients pass it as `?world_id=`.
    world_id: String,
    #[serde(default)]
    mode: WorldMode,
}

#[derive(Debug, serde::Serialize)]
struct WorldInitResponse {
    world_id: String,
    mode: WorldMode,
}

pub async fn create_world_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WorldInitRequest>,
) -> impl IntoResponse {
    let world_id = payload.world_id.trim().to_string();

    match state
        .world_registry
        .create_world(&world_id, payload.mode)
        .await
    {
        Ok(world) => {
            // Serializer first so clients can subscribe immediately.
            spawn_world_serializer(&world);
            (
                StatusCode::CREATED,
                Json(WorldInitResponse {
                    world_id,
                    mode: world.mode,
                }),
            )
                .into_response()
        }
        Err(WorldError::InvalidId) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("world_id is required")),
        )
            .into_response(),
        Err(WorldError::AlreadyExists) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new("world already exists")),
        )
            .into_response(),
    }
}
