use crate::api::body::decode_update;
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::state::{Record, World};
use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::HeaderMap,
    response::{Json, Redirect},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// GET / - send browsers to the bundled client page
pub(crate) async fn redirect_to_client(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(&state.client_page)
}

/// POST|PUT /entity/:id - merge each attribute in the body into the entity
///
/// Each key is applied as its own update, so subscribers see one change per
/// attribute. Returns the full record after the last key.
pub(crate) async fn update_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Record>, ApiError> {
    let body = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;

    let attributes = decode_update(&headers, &body)?;

    info!(entity = %id, attributes = attributes.len(), "Updating entity");

    let mut record = None;
    for (key, value) in attributes {
        record = Some(state.world.update(&id, &key, value));
    }

    // An empty object changes nothing; answer with the current record
    Ok(Json(record.unwrap_or_else(|| state.world.get(&id))))
}

/// GET /entity/:id - current record, `{}` if never written
pub(crate) async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Record> {
    Json(state.world.get(&id))
}

/// GET|POST /world - every entity keyed by id
pub(crate) async fn get_world(State(state): State<Arc<AppState>>) -> Json<World> {
    Json(state.world.snapshot())
}

/// GET|POST /clear - drop all entities (subscribers are not told)
pub(crate) async fn clear_world(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.world.clear();
    Json(json!({ "cleared": 1 }))
}
