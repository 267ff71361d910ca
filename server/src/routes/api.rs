use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use legend_shared::{EntrySnapshot, LegendSnapshot};
use serde::Deserialize;
use tracing::debug;

use crate::legend::EntryId;
use crate::legend::visibility::{set_visibility, toggle_visibility};
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "entries": state.engine.entries().len(),
        "layers": state.layers.len(),
        "enrichment_in_flight": state.engine.services().tasks.in_flight(),
    }))
}

pub async fn get_legend(State(state): State<AppState>) -> Json<LegendSnapshot> {
    Json(state.engine.snapshot())
}

#[derive(Debug, Default, Deserialize)]
pub struct VisibilityRequest {
    #[serde(default)]
    pub visible: Option<bool>,
}

/// Sets or, without a body, toggles the visibility of any entry in the tree.
pub async fn set_entry_visibility(
    State(state): State<AppState>,
    Path(id): Path<EntryId>,
    body: Bytes,
) -> Result<Json<EntrySnapshot>, StatusCode> {
    let request = if body.is_empty() {
        VisibilityRequest::default()
    } else {
        serde_json::from_slice::<VisibilityRequest>(&body).map_err(|_| StatusCode::BAD_REQUEST)?
    };
    let entry = state.engine.find(id).ok_or(StatusCode::NOT_FOUND)?;

    match request.visible {
        Some(visible) => set_visibility(&entry, visible),
        None => {
            toggle_visibility(&entry);
        }
    }
    debug!(entry = id, visible = entry.is_visible(), "visibility changed");
    Ok(Json(entry.snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub index: usize,
}

pub async fn move_entry(
    State(state): State<AppState>,
    Path(id): Path<EntryId>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let entry = state.engine.find(id).ok_or(StatusCode::NOT_FOUND)?;
    if !entry.is_reorderable() {
        return Err(StatusCode::CONFLICT);
    }
    let index = state
        .engine
        .move_entry(&entry, request.index)
        .ok_or(StatusCode::CONFLICT)?;
    Ok(Json(serde_json::json!({ "id": id, "index": index })))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<EntryId>,
) -> StatusCode {
    let Some(entry) = state.engine.find(id) else {
        return StatusCode::NOT_FOUND;
    };
    match state.engine.remove(&entry) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}
