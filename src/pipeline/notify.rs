//! Client notification layer
//!
//! The pipeline talks to an abstract [`Notifier`] (one method per event
//! kind) and never sees the transport. [`ClientHub`] maps connection ids to
//! outbound channels; delivery to a connection that has gone away is dropped
//! silently so a disconnect mid-request never disturbs a worker.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::cache::Metadata;
use super::classify::ClassifiedError;

/// Events pushed to the browser over the WebSocket
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ProcessingStart {
        image: String,
    },
    MetadataUpdate {
        image: String,
        status: String,
        cached: bool,
        metadata: Metadata,
    },
    Error {
        image: String,
        category: String,
        title: String,
        message: String,
        action: String,
        retry_allowed: bool,
    },
    /// Protocol-level refusal issued before any work starts (rate limit,
    /// malformed request, missing credential) — deliberately distinct from
    /// the classified `Error` event
    Rejected {
        reason: String,
    },
}

/// Push interface consumed by the pipeline, one method per event kind
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn processing_started(&self, image: &str);
    async fn result(&self, image: &str, cached: bool, metadata: &Metadata);
    async fn error(&self, image: &str, error: &ClassifiedError);
}

/// Registry of connected clients and their outbound event channels
#[derive(Default)]
pub struct ClientHub {
    clients: DashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: Uuid, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.clients.insert(connection_id, tx);
    }

    pub fn unregister(&self, connection_id: Uuid) {
        self.clients.remove(&connection_id);
    }

    /// Deliver an event to one connection. Returns false when the connection
    /// is gone; the event is discarded without error.
    pub fn send(&self, connection_id: Uuid, event: ServerEvent) -> bool {
        match self.clients.get(&connection_id) {
            Some(tx) => {
                if tx.send(event).is_err() {
                    debug!(%connection_id, "Dropped event for closed connection");
                    return false;
                }
                true
            }
            None => {
                debug!(%connection_id, "Dropped event for unknown connection");
                false
            }
        }
    }

    pub fn connected_clients(&self) -> usize {
        self.clients.len()
    }
}

/// [`Notifier`] bound to one originating connection
pub struct ClientNotifier {
    hub: Arc<ClientHub>,
    connection_id: Uuid,
}

impl ClientNotifier {
    pub fn new(hub: Arc<ClientHub>, connection_id: Uuid) -> Self {
        Self { hub, connection_id }
    }
}

#[async_trait]
impl Notifier for ClientNotifier {
    async fn processing_started(&self, image: &str) {
        self.hub.send(
            self.connection_id,
            ServerEvent::ProcessingStart {
                image: image.to_string(),
            },
        );
    }

    async fn result(&self, image: &str, cached: bool, metadata: &Metadata) {
        self.hub.send(
            self.connection_id,
            ServerEvent::MetadataUpdate {
                image: image.to_string(),
                status: "complete".to_string(),
                cached,
                metadata: metadata.clone(),
            },
        );
    }

    async fn error(&self, image: &str, error: &ClassifiedError) {
        self.hub.send(
            self.connection_id,
            ServerEvent::Error {
                image: image.to_string(),
                category: error.category.as_str().to_string(),
                title: error.title.clone(),
                message: error.message.clone(),
                action: error.action.clone(),
                retry_allowed: error.retry_allowed,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hub_delivers_to_registered_client() {
        let hub = ClientHub::new();
        let conn = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        hub.register(conn, tx);
        assert!(hub.send(
            conn,
            ServerEvent::ProcessingStart {
                image: "a.jpg".to_string()
            }
        ));

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            ServerEvent::ProcessingStart {
                image: "a.jpg".to_string()
            }
        );
    }

    #[tokio::test]
    async fn send_to_unknown_connection_fails_silently() {
        let hub = ClientHub::new();
        assert!(!hub.send(
            Uuid::new_v4(),
            ServerEvent::ProcessingStart {
                image: "a.jpg".to_string()
            }
        ));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_fails_silently() {
        let hub = ClientHub::new();
        let conn = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.register(conn, tx);
        drop(rx);

        assert!(!hub.send(
            conn,
            ServerEvent::ProcessingStart {
                image: "a.jpg".to_string()
            }
        ));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ServerEvent::MetadataUpdate {
            image: "a.jpg".to_string(),
            status: "complete".to_string(),
            cached: false,
            metadata: Metadata::new(),
        };

        let raw = serde_json::to_value(&event).unwrap();
        assert_eq!(raw["type"], "metadata_update");
        assert_eq!(raw["cached"], false);

        let rejected = ServerEvent::Rejected {
            reason: "rate limit exceeded".to_string(),
        };
        let raw = serde_json::to_value(&rejected).unwrap();
        assert_eq!(raw["type"], "rejected");
    }
}
