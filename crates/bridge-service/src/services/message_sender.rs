//! Outbound message transmission.

use crate::errors::BridgeError;
use crate::models::OutboundMessage;
use crate::services::wechat_client::{TemplateData, TemplateMessage, TemplateValue, WechatClient};
use std::sync::Arc;
use tracing::instrument;

/// Trait for message transmission (enables mocking).
#[async_trait::async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver a message to its receiver.
    async fn send(&self, message: &OutboundMessage) -> Result<(), BridgeError>;
}

/// Sends messages as platform template messages.
///
/// The template has two fields, `title` and `body`. The link attached to the
/// message is its own `url` if given, otherwise `detail_url` followed by the
/// message id if configured, otherwise none.
#[derive(Debug, Clone)]
pub struct WechatMessageSender {
    client: Arc<WechatClient>,
    template_id: String,
    detail_url: Option<String>,
}

impl WechatMessageSender {
    pub fn new(client: Arc<WechatClient>, template_id: String, detail_url: Option<String>) -> Self {
        Self {
            client,
            template_id,
            detail_url,
        }
    }

    /// Build the template message for an outbound message.
    pub fn template_for(&self, message: &OutboundMessage) -> TemplateMessage {
        let url = message.url.clone().or_else(|| {
            self.detail_url
                .as_ref()
                .map(|prefix| format!("{prefix}{}", message.id))
        });

        TemplateMessage {
            touser: message.receiver.clone(),
            template_id: self.template_id.clone(),
            url,
            data: TemplateData {
                title: TemplateValue::new(message.title.clone()),
                body: TemplateValue::new(message.body.clone().unwrap_or_default()),
            },
        }
    }
}

#[async_trait::async_trait]
impl MessageSender for WechatMessageSender {
    #[instrument(skip_all, fields(message_id = %message.id))]
    async fn send(&self, message: &OutboundMessage) -> Result<(), BridgeError> {
        let template = self.template_for(message);
        self.client.send_template_message(&template).await
    }
}

/// Mock message sender for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock sender that records what it was asked to send.
    pub struct MockMessageSender {
        sent: Mutex<Vec<OutboundMessage>>,
        call_count: AtomicUsize,
        return_error: bool,
    }

    impl MockMessageSender {
        /// Create a mock that always delivers.
        pub fn succeeding() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                return_error: false,
            }
        }

        /// Create a mock that always fails with an upstream error.
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                return_error: true,
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Messages passed to successful sends, in order.
        pub fn sent(&self) -> Vec<OutboundMessage> {
            self.sent
                .lock()
                .map(|sent| sent.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl MessageSender for MockMessageSender {
        async fn send(&self, message: &OutboundMessage) -> Result<(), BridgeError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if self.return_error {
                return Err(BridgeError::Upstream("Mock message sender error".to_string()));
            }

            if let Ok(mut sent) = self.sent.lock() {
                sent.push(message.clone());
            }
            Ok(())
        }
    }
}
