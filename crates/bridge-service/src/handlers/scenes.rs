//! Scene handlers.

use crate::errors::BridgeError;
use crate::models::{CreateSceneResponse, SceneBindingResponse};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Handler for POST /scene
///
/// Creates a pending scene and returns its QR ticket.
///
/// ```json
/// {
///   "qr_url": "https://mp.weixin.qq.com/cgi-bin/showqrcode?ticket=...",
///   "scene_id": "0f8fad5b-d9cb-469f-a165-70867728950e",
///   "ticket": "..."
/// }
/// ```
#[instrument(skip_all, name = "bridge.scenes.create")]
pub async fn create_scene(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CreateSceneResponse>, BridgeError> {
    let scene = state.scenes.create().await?;
    Ok(Json(CreateSceneResponse::from(&scene)))
}

/// Handler for GET /scene/{scene_id}
///
/// 200 `{"openID": ...}` once bound. Unknown, pending and unparsable ids are
/// all 404 `{}`.
#[instrument(skip_all, name = "bridge.scenes.get")]
pub async fn get_scene(
    State(state): State<Arc<AppState>>,
    Path(scene_id): Path<String>,
) -> Result<Json<SceneBindingResponse>, BridgeError> {
    let scene_id = Uuid::parse_str(&scene_id).map_err(|_| BridgeError::NotFound)?;
    let open_id = state.scenes.get(scene_id).await?;

    Ok(Json(SceneBindingResponse { open_id }))
}
