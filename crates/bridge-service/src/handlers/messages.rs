//! Message handlers.

use crate::errors::BridgeError;
use crate::models::{MessageRecord, NewMessage, NewMessageForm};
use crate::routes::AppState;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap};
use axum::{Form, Json};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Handler for POST /message
///
/// Form fields: `title`, `receiver`, optional `body` and `url`. The
/// submitter's address and user agent are recorded with the message.
#[instrument(skip_all, name = "bridge.messages.create")]
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<NewMessageForm>,
) -> Result<Json<MessageRecord>, BridgeError> {
    let mut message = NewMessage::from(form);
    message.ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    message.user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let record = state.messages.submit(message).await?;
    Ok(Json(record))
}

/// Handler for GET /message/{message_id}
#[instrument(skip_all, name = "bridge.messages.get")]
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
) -> Result<Json<MessageRecord>, BridgeError> {
    let message_id = Uuid::parse_str(&message_id).map_err(|_| BridgeError::NotFound)?;
    let record = state.messages.get(message_id).await?;

    Ok(Json(record))
}
