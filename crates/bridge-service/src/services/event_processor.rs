//! Inbound platform event processing.
//!
//! The platform pushes events as small XML documents:
//!
//! ```xml
//! <xml>
//!   <ToUserName><![CDATA[gh_account]]></ToUserName>
//!   <FromUserName><![CDATA[o6_bmjrPTlm6_2sgVt7hMZOPfL2M]]></FromUserName>
//!   <CreateTime>1700000000</CreateTime>
//!   <MsgType><![CDATA[event]]></MsgType>
//!   <Event><![CDATA[subscribe]]></Event>
//!   <EventKey><![CDATA[qrscene_0f8fad5b-d9cb-469f-a165-70867728950e]]></EventKey>
//! </xml>
//! ```
//!
//! Only two events touch the scene registry: a subscribe through a scene's QR
//! code (`qrscene_<scene_id>`) and a scan of the code by a user who already
//! follows the account (bare `<scene_id>`). Everything else is logged and
//! dropped.

use crate::observability::{hash_for_correlation, metrics};
use crate::services::scene_registry::{BindOutcome, SceneRegistry};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Event key prefix the platform adds for subscriptions through a QR code.
const SUBSCRIBE_SCENE_PREFIX: &str = "qrscene_";

/// A parsed platform push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// A user followed the account, possibly through a QR code.
    Subscribe {
        open_id: String,
        event_key: Option<String>,
    },

    /// A user who already follows the account scanned a QR code.
    Scan { open_id: String, event_key: String },

    Unsubscribe { open_id: String },

    /// Any other message or event, including unparsable payloads.
    Unrecognized {
        msg_type: Option<String>,
        event: Option<String>,
    },
}

/// What processing an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event resolved to a scene; carries what the bind did.
    Scene(BindOutcome),
    /// Well-formed but not a scene event.
    Ignored,
    /// The body was not valid event XML.
    Malformed,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Scene(bind) => bind.as_str(),
            EventOutcome::Ignored => "ignored",
            EventOutcome::Malformed => "malformed",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawEvent {
    #[serde(rename = "FromUserName", default)]
    from_user_name: Option<String>,
    #[serde(rename = "MsgType", default)]
    msg_type: Option<String>,
    #[serde(rename = "Event", default)]
    event: Option<String>,
    #[serde(rename = "EventKey", default)]
    event_key: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an event body, failing on malformed XML.
///
/// # Errors
///
/// Returns the deserializer error if `body` is not an XML document.
pub fn try_parse(body: &str) -> Result<PlatformEvent, quick_xml::de::DeError> {
    let raw: RawEvent = quick_xml::de::from_str(body)?;

    let msg_type = non_empty(raw.msg_type);
    let event = non_empty(raw.event);
    let open_id = non_empty(raw.from_user_name);
    let event_key = non_empty(raw.event_key);

    let is_event = msg_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("event"));
    let event_name = event.as_deref().map(str::to_ascii_lowercase);

    let parsed = match (is_event, event_name.as_deref(), open_id) {
        (true, Some("subscribe"), Some(open_id)) => PlatformEvent::Subscribe { open_id, event_key },
        (true, Some("scan"), Some(open_id)) => match event_key {
            Some(event_key) => PlatformEvent::Scan { open_id, event_key },
            None => PlatformEvent::Unrecognized { msg_type, event },
        },
        (true, Some("unsubscribe"), Some(open_id)) => PlatformEvent::Unsubscribe { open_id },
        _ => PlatformEvent::Unrecognized { msg_type, event },
    };

    Ok(parsed)
}

/// Lossy form of [`try_parse`] for callers that do not need the error.
///
/// Malformed XML becomes `Unrecognized` with no fields. `EventProcessor`
/// calls `try_parse` itself so it can report malformed bodies separately.
pub fn parse(body: &str) -> PlatformEvent {
    try_parse(body).unwrap_or(PlatformEvent::Unrecognized {
        msg_type: None,
        event: None,
    })
}

/// The (scene, open ID) pair an event binds, if any.
pub fn subscribe_target(event: &PlatformEvent) -> Option<(Uuid, &str)> {
    match event {
        PlatformEvent::Subscribe {
            open_id,
            event_key: Some(key),
        } => key
            .strip_prefix(SUBSCRIBE_SCENE_PREFIX)
            .and_then(|id| Uuid::parse_str(id).ok())
            .map(|scene_id| (scene_id, open_id.as_str())),
        PlatformEvent::Scan { open_id, event_key } => Uuid::parse_str(event_key)
            .ok()
            .map(|scene_id| (scene_id, open_id.as_str())),
        _ => None,
    }
}

/// Applies inbound events to the scene registry.
#[derive(Clone)]
pub struct EventProcessor {
    scenes: Arc<SceneRegistry>,
}

impl EventProcessor {
    pub fn new(scenes: Arc<SceneRegistry>) -> Self {
        Self { scenes }
    }

    /// Parse `body` and apply it. Never fails; every outcome is logged.
    #[instrument(skip_all)]
    pub async fn process(&self, body: &str) -> EventOutcome {
        let outcome = match try_parse(body) {
            Ok(event) => self.apply(&event).await,
            Err(e) => {
                warn!(target: "bridge.services.events", error = %e, "Malformed event payload dropped");
                EventOutcome::Malformed
            }
        };

        metrics::record_event(outcome.as_str());
        outcome
    }

    async fn apply(&self, event: &PlatformEvent) -> EventOutcome {
        if let Some((scene_id, open_id)) = subscribe_target(event) {
            return EventOutcome::Scene(self.scenes.bind(scene_id, open_id).await);
        }

        match event {
            PlatformEvent::Subscribe { open_id, .. } | PlatformEvent::Scan { open_id, .. } => {
                debug!(
                    target: "bridge.services.events",
                    open_id_hash = %hash_for_correlation(open_id),
                    "Event key does not name a scene"
                );
            }
            PlatformEvent::Unsubscribe { open_id } => {
                debug!(
                    target: "bridge.services.events",
                    open_id_hash = %hash_for_correlation(open_id),
                    "Unsubscribe event ignored"
                );
            }
            PlatformEvent::Unrecognized { msg_type, event } => {
                debug!(
                    target: "bridge.services.events",
                    msg_type = msg_type.as_deref().unwrap_or(""),
                    event = event.as_deref().unwrap_or(""),
                    "Unrecognized push ignored"
                );
            }
        }
        EventOutcome::Ignored
    }
}
