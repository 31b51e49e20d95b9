//! Outbound message tracking.
//!
//! Validates message submissions, records them, and hands each one to the
//! `MessageSender` on its own task. The record's status moves from
//! `accepted` to `sent` or `failed` once, when that task finishes.

use crate::errors::{BridgeError, OPEN_ID_ILLEGAL};
use crate::models::{MessageRecord, MessageStatus, NewMessage, OutboundMessage};
use crate::observability::{hash_for_correlation, metrics};
use crate::services::message_sender::MessageSender;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Length of a platform open ID.
pub const OPEN_ID_LENGTH: usize = 28;

/// Returns true if `value` has the shape of a platform open ID: 28 characters
/// from `[A-Za-z0-9_-]`.
pub fn is_valid_open_id(value: &str) -> bool {
    value.len() == OPEN_ID_LENGTH
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

type MessageStore = Arc<RwLock<HashMap<Uuid, MessageRecord>>>;

/// In-memory message store with background delivery.
pub struct MessageTracker {
    messages: MessageStore,
    sender: Arc<dyn MessageSender>,
}

impl MessageTracker {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self {
            messages: Arc::new(RwLock::new(HashMap::new())),
            sender,
        }
    }

    /// Validate and record a message, then start its delivery.
    ///
    /// Returns the record as stored, with status `accepted`. Delivery runs on
    /// a spawned task and never blocks the caller.
    ///
    /// # Errors
    ///
    /// `BridgeError::BadRequest` if the receiver is not an open ID or the
    /// title is missing. Nothing is stored in either case.
    #[instrument(skip_all, fields(message_id))]
    pub async fn submit(&self, message: NewMessage) -> Result<MessageRecord, BridgeError> {
        let record = match validate(message) {
            Ok(record) => record,
            Err(e) => {
                metrics::record_message_submitted(false);
                return Err(e);
            }
        };
        tracing::Span::current().record("message_id", tracing::field::display(record.id));

        self.messages
            .write()
            .await
            .insert(record.id, record.clone());
        metrics::record_message_submitted(true);

        info!(
            target: "bridge.services.messages",
            message_id = %record.id,
            receiver_hash = %hash_for_correlation(&record.receiver),
            "Message accepted"
        );

        self.spawn_delivery(OutboundMessage::from(&record));
        Ok(record)
    }

    /// Look up a message by id.
    ///
    /// # Errors
    ///
    /// `BridgeError::NotFound` if no message has that id.
    pub async fn get(&self, id: Uuid) -> Result<MessageRecord, BridgeError> {
        self.messages
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(BridgeError::NotFound)
    }

    fn spawn_delivery(&self, outbound: OutboundMessage) {
        let messages = Arc::clone(&self.messages);
        let sender = Arc::clone(&self.sender);

        tokio::spawn(async move {
            let start = Instant::now();
            let status = match sender.send(&outbound).await {
                Ok(()) => {
                    info!(target: "bridge.services.messages", message_id = %outbound.id, "Message sent");
                    MessageStatus::Sent
                }
                Err(e) => {
                    warn!(target: "bridge.services.messages", message_id = %outbound.id, error = %e, "Message delivery failed");
                    MessageStatus::Failed
                }
            };
            metrics::record_message_delivery(status.as_str(), start.elapsed());

            if let Some(record) = messages.write().await.get_mut(&outbound.id) {
                record.status = status;
            }
        });
    }
}

fn validate(message: NewMessage) -> Result<MessageRecord, BridgeError> {
    let receiver = message
        .receiver
        .filter(|r| is_valid_open_id(r))
        .ok_or_else(|| BridgeError::BadRequest(OPEN_ID_ILLEGAL.to_string()))?;

    let title = message
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| BridgeError::BadRequest("Missing title".to_string()))?;

    Ok(MessageRecord {
        id: Uuid::new_v4(),
        title,
        body: message.body.filter(|b| !b.is_empty()),
        url: message.url.filter(|u| !u.is_empty()),
        receiver,
        status: MessageStatus::Accepted,
        created_at: Utc::now(),
        ip: message.ip,
        user_agent: message.user_agent,
    })
}
