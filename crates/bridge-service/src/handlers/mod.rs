//! HTTP request handlers for the bridge service.

pub mod callback;
pub mod health;
pub mod messages;
pub mod metrics;
pub mod scenes;

pub use callback::{callback_event, callback_negotiate};
pub use health::{health_check, not_found};
pub use messages::{create_message, get_message};
pub use metrics::metrics_handler;
pub use scenes::{create_scene, get_scene};
