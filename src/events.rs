// src/events.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::broadcast;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub target_id: Option<Uuid>,
    pub metadata: HashMap<String, String>,
    pub timestamp: chrono::DateTime<Utc>,
}

pub struct EventHub {
    sender: broadcast::Sender<AuditEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: AuditEvent) {
        let _ = self.sender.send(event); // no subscribers is fine
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Write every audit event to the log until the hub goes away
pub fn spawn_audit_logger(hub: &EventHub) -> tokio::task::JoinHandle<()> {
    let mut rx = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::info!(
                    target: "audit",
                    action = %event.action,
                    actor = ?event.actor_id,
                    target_id = ?event.target_id,
                    metadata = ?event.metadata,
                    "audit event"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "audit", skipped, "audit logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[macro_export]
macro_rules! audit_log {
    ($hub:expr, $action:expr, $actor:expr, $target:expr $(, $key:expr => $value:expr)* $(,)?) => {
        {
            #[allow(unused_mut)]
            let mut meta = std::collections::HashMap::new();
            $(
                meta.insert($key.to_string(), $value.to_string());
            )*
            let event = $crate::events::AuditEvent {
                id: uuid::Uuid::new_v4(),
                action: $action.to_string(),
                actor_id: $actor,
                target_id: $target,
                metadata: meta,
                timestamp: chrono::Utc::now(),
            };
            $hub.emit(event);
        }
    };
}

// Usage:
// audit_log!(hub, "org.member.role_changed", Some(actor.id), Some(target), "role" => role);
