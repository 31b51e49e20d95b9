//! Scene registry.
//!
//! Holds every scene created in this process. A scene is created pending,
//! with a platform ticket, and is bound to the open ID of the first user who
//! subscribes (or scans) through its QR code. Bindings never change once set.

use crate::errors::BridgeError;
use crate::models::SceneRecord;
use crate::observability::{hash_for_correlation, metrics};
use crate::services::ticket_issuer::TicketIssuer;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Result of applying a binding to a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The scene was pending and is now bound.
    Bound,
    /// The scene was already bound; nothing changed.
    AlreadyBound,
    /// No scene with that id exists; nothing changed.
    UnknownScene,
}

impl BindOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindOutcome::Bound => "bound",
            BindOutcome::AlreadyBound => "already_bound",
            BindOutcome::UnknownScene => "unknown_scene",
        }
    }
}

/// In-memory scene store.
pub struct SceneRegistry {
    scenes: Arc<RwLock<HashMap<Uuid, SceneRecord>>>,
    issuer: Arc<dyn TicketIssuer>,
    expire_seconds: u32,
    issue_timeout: Duration,
}

impl SceneRegistry {
    /// Create an empty registry.
    ///
    /// # Arguments
    ///
    /// * `issuer` - Source of QR tickets for new scenes
    /// * `expire_seconds` - Lifetime requested for each ticket
    /// * `issue_timeout` - How long a single issuer call may take
    pub fn new(issuer: Arc<dyn TicketIssuer>, expire_seconds: u32, issue_timeout: Duration) -> Self {
        Self {
            scenes: Arc::new(RwLock::new(HashMap::new())),
            issuer,
            expire_seconds,
            issue_timeout,
        }
    }

    /// Create a pending scene with a fresh ticket.
    ///
    /// The ticket is issued before the store is touched and no lock is held
    /// across the issuer call.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Upstream` if the issuer fails or does not answer
    /// within the issue timeout. Nothing is stored in either case.
    #[instrument(skip_all, fields(scene_id))]
    pub async fn create(&self) -> Result<SceneRecord, BridgeError> {
        let scene_id = Uuid::new_v4();
        tracing::Span::current().record("scene_id", tracing::field::display(scene_id));

        let start = Instant::now();
        let issued = tokio::time::timeout(
            self.issue_timeout,
            self.issuer.issue(scene_id, self.expire_seconds),
        )
        .await
        .unwrap_or_else(|_| Err(BridgeError::Upstream("Ticket issuance timed out".to_string())));
        let elapsed = start.elapsed();

        let issued = match issued {
            Ok(issued) => issued,
            Err(e) => {
                metrics::record_scene_created(false, elapsed);
                warn!(target: "bridge.services.scenes", scene_id = %scene_id, "Ticket issuance failed");
                return Err(match e {
                    BridgeError::Upstream(detail) => BridgeError::Upstream(detail),
                    other => BridgeError::Upstream(other.to_string()),
                });
            }
        };

        let record = SceneRecord {
            scene_id,
            ticket: issued.ticket,
            qr_url: issued.qr_url,
            bound_open_id: None,
            created_at: Utc::now(),
            bound_at: None,
        };

        self.scenes.write().await.insert(scene_id, record.clone());
        metrics::record_scene_created(true, elapsed);

        info!(target: "bridge.services.scenes", scene_id = %scene_id, "Scene created");
        Ok(record)
    }

    /// Look up the open ID bound to a scene.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::NotFound` for unknown scenes and for scenes that
    /// are still pending.
    pub async fn get(&self, scene_id: Uuid) -> Result<String, BridgeError> {
        let scenes = self.scenes.read().await;
        scenes
            .get(&scene_id)
            .and_then(|scene| scene.bound_open_id.clone())
            .ok_or(BridgeError::NotFound)
    }

    /// Full record for a scene, pending or bound.
    pub async fn record(&self, scene_id: Uuid) -> Option<SceneRecord> {
        self.scenes.read().await.get(&scene_id).cloned()
    }

    /// Bind `open_id` to a pending scene.
    ///
    /// The check and the set happen under one write lock, so concurrent
    /// deliveries of the same event bind once. The first identity wins; a
    /// later bind with a different identity is ignored.
    #[instrument(skip_all, fields(scene_id = %scene_id))]
    pub async fn bind(&self, scene_id: Uuid, open_id: &str) -> BindOutcome {
        let mut scenes = self.scenes.write().await;

        let Some(scene) = scenes.get_mut(&scene_id) else {
            debug!(target: "bridge.services.scenes", scene_id = %scene_id, "Bind for unknown scene ignored");
            return BindOutcome::UnknownScene;
        };

        match scene.bound_open_id.as_deref() {
            None => {
                scene.bound_open_id = Some(open_id.to_string());
                scene.bound_at = Some(Utc::now());

                metrics::record_scene_bound();
                info!(
                    target: "bridge.services.scenes",
                    scene_id = %scene_id,
                    open_id_hash = %hash_for_correlation(open_id),
                    "Scene bound"
                );
                BindOutcome::Bound
            }
            Some(existing) if existing == open_id => {
                debug!(target: "bridge.services.scenes", scene_id = %scene_id, "Duplicate bind ignored");
                BindOutcome::AlreadyBound
            }
            Some(existing) => {
                warn!(
                    target: "bridge.services.scenes",
                    scene_id = %scene_id,
                    bound_hash = %hash_for_correlation(existing),
                    rejected_hash = %hash_for_correlation(open_id),
                    "Scene already bound to a different identity, bind ignored"
                );
                BindOutcome::AlreadyBound
            }
        }
    }

    /// Number of scenes held.
    pub async fn len(&self) -> usize {
        self.scenes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
