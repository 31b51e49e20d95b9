//! Service layer for the bridge.
//!
//! # Components
//!
//! - `clock` - Injectable source of the current time
//! - `signature` - Callback signature verification
//! - `event_processor` - Parses platform pushes and applies scene events
//! - `scene_registry` - In-memory QR scene store
//! - `message_tracker` - Message validation, storage and delivery
//! - `ticket_issuer` / `message_sender` - Collaborator traits and their
//!   platform-backed implementations
//! - `wechat_client` - HTTP client for the platform API

pub mod clock;
pub mod event_processor;
pub mod message_sender;
pub mod message_tracker;
pub mod scene_registry;
pub mod signature;
pub mod ticket_issuer;
pub mod wechat_client;

pub use clock::{Clock, FixedClock, SystemClock};
pub use event_processor::{EventOutcome, EventProcessor, PlatformEvent};
pub use message_sender::{MessageSender, WechatMessageSender};
pub use message_tracker::MessageTracker;
pub use scene_registry::{BindOutcome, SceneRegistry};
pub use signature::SignatureVerifier;
pub use ticket_issuer::{TicketIssuer, WechatTicketIssuer};
pub use wechat_client::WechatClient;
