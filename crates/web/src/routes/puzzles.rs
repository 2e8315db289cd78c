use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use puzzle_bridge_core::engine::EngineLauncher;
use puzzle_bridge_core::puzzles::{
    DatasetMetadata, PuzzleCatalog, PuzzlePage, PuzzleQuery, PuzzleRecord,
};

use crate::error::AppError;
use crate::AppState;

fn catalog<L>(state: &AppState<L>) -> Result<&PuzzleCatalog, AppError> {
    state
        .catalog
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("No puzzle dataset loaded".to_string()))
}

pub async fn list<L: EngineLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Query(query): Query<PuzzleQuery>,
) -> Result<Json<PuzzlePage>, AppError> {
    let page = catalog(&state)?
        .search(&query)
        .map_err(AppError::BadRequest)?;
    Ok(Json(page))
}

pub async fn random<L: EngineLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Query(query): Query<PuzzleQuery>,
) -> Result<Json<PuzzleRecord>, AppError> {
    catalog(&state)?
        .random(&query)
        .map_err(AppError::BadRequest)?
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No puzzle matches the filters".to_string()))
}

pub async fn meta<L: EngineLauncher>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<Json<DatasetMetadata>, AppError> {
    Ok(Json(catalog(&state)?.metadata().clone()))
}

pub async fn by_id<L: EngineLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<String>,
) -> Result<Json<PuzzleRecord>, AppError> {
    catalog(&state)?
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Puzzle not found: {id}")))
}
