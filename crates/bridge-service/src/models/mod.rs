//! Bridge service models.
//!
//! Records owned by the in-memory stores and the request/response bodies of
//! the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Scenes
// ============================================================================

/// A QR-code scene registration.
///
/// Pending until a subscribe (or scan) event binds an open ID to it; the
/// binding happens at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRecord {
    /// External key, generated at creation.
    pub scene_id: Uuid,

    /// Ticket issued by the platform for this scene.
    pub ticket: String,

    /// URL of the QR image for the ticket.
    pub qr_url: String,

    /// Open ID of the user who scanned the code, once known.
    pub bound_open_id: Option<String>,

    pub created_at: DateTime<Utc>,

    pub bound_at: Option<DateTime<Utc>>,
}

impl SceneRecord {
    /// Returns true once an open ID has been bound.
    pub fn is_bound(&self) -> bool {
        self.bound_open_id.is_some()
    }
}

/// Ticket and QR URL returned by a `TicketIssuer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTicket {
    pub ticket: String,
    pub qr_url: String,
}

/// Response of `POST /scene`.
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSceneResponse {
    pub qr_url: String,
    pub scene_id: Uuid,
    pub ticket: String,
}

impl From<&SceneRecord> for CreateSceneResponse {
    fn from(scene: &SceneRecord) -> Self {
        Self {
            qr_url: scene.qr_url.clone(),
            scene_id: scene.scene_id,
            ticket: scene.ticket.clone(),
        }
    }
}

/// Response of `GET /scene/{scene_id}` for a bound scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneBindingResponse {
    #[serde(rename = "openID")]
    pub open_id: String,
}

// ============================================================================
// Messages
// ============================================================================

/// Delivery state of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Stored and handed to the sender.
    Accepted,

    /// The platform accepted the message.
    Sent,

    /// The send attempt failed.
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Accepted => "accepted",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        }
    }
}

/// A tracked outbound message. Also the body of the message endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub receiver: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Form body of `POST /message`.
///
/// Every field is optional at the extractor level so that missing fields are
/// reported with the service's own error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMessageForm {
    pub title: Option<String>,
    pub receiver: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
}

/// A message submission after extraction, before validation.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub title: Option<String>,
    pub receiver: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl From<NewMessageForm> for NewMessage {
    fn from(form: NewMessageForm) -> Self {
        Self {
            title: form.title,
            receiver: form.receiver,
            body: form.body,
            url: form.url,
            ip: None,
            user_agent: None,
        }
    }
}

/// What a `MessageSender` transmits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub receiver: String,
    pub title: String,
    pub body: Option<String>,
    /// Link the receiver opens from the message.
    pub url: Option<String>,
}

impl From<&MessageRecord> for OutboundMessage {
    fn from(record: &MessageRecord) -> Self {
        Self {
            id: record.id,
            receiver: record.receiver.clone(),
            title: record.title.clone(),
            body: record.body.clone(),
            url: record.url.clone(),
        }
    }
}

// ============================================================================
// Callback
// ============================================================================

/// Query string of the callback endpoint.
///
/// All fields are optional so that missing parameters become a 400 with the
/// service's error body instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub signature: Option<String>,
    pub echostr: Option<String>,
}

// ============================================================================
// Health
// ============================================================================

/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
