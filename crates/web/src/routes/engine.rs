use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use puzzle_bridge_core::engine::EngineLauncher;
use puzzle_bridge_core::puzzles::convert::parse_position;
use puzzle_bridge_core::EngineError;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub fen: Option<String>,
    pub elo: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    #[serde(rename = "move")]
    pub best_move: String,
}

/// `POST /api/:engine/move` with `{fen, elo?}`
pub async fn best_move<L: EngineLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(engine): Path<String>,
    body: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<MoveResponse>, AppError> {
    let Some(service) = state.engines.get(&engine) else {
        return Err(match state.unavailable.get(&engine) {
            Some(reason) => AppError::Engine(EngineError::Unavailable(reason.clone())),
            None => AppError::NotFound(format!("Unknown engine: {engine}")),
        });
    };

    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let fen = request
        .fen
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AppError::BadRequest("FEN is required".to_string()))?;
    parse_position(fen).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let best_move = service.best_move(fen, request.elo).await?;
    Ok(Json(MoveResponse { best_move }))
}
