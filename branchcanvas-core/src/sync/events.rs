use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::canvas::CanvasNode;
use crate::utils::EventBroadcaster;

const DEFAULT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeKind {
    /// Node created or moved; carries the full stored row.
    NodeUpserted { node: CanvasNode },
    NodeRemoved { node_id: String, at: DateTime<Utc> },
    /// Project created, renamed or touched.
    ProjectUpdated {
        title: String,
        last_modified: DateTime<Utc>,
    },
    ProjectDeleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Writer that produced the change.
    pub origin: Uuid,
    pub project_id: String,
    pub kind: ChangeKind,
}

/// Publishing side of the change channel, stamped with this writer's origin.
#[derive(Clone)]
pub struct ChangeFeed {
    origin: Uuid,
    broadcaster: EventBroadcaster<String, ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            origin: Uuid::new_v4(),
            broadcaster: EventBroadcaster::new(DEFAULT_BUFFER),
        }
    }

    /// Another writer on the same channels, e.g. a second window.
    pub fn fork(&self) -> Self {
        Self {
            origin: Uuid::new_v4(),
            broadcaster: self.broadcaster.clone(),
        }
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub async fn subscribe(&self, project_id: &str) -> broadcast::Receiver<ChangeEvent> {
        self.broadcaster.subscribe(project_id.to_string()).await
    }

    pub async fn publish(&self, project_id: &str, kind: ChangeKind) -> usize {
        let event = ChangeEvent {
            origin: self.origin,
            project_id: project_id.to_string(),
            kind,
        };
        let delivered = self
            .broadcaster
            .publish(project_id.to_string(), event)
            .await;
        debug!(project_id, delivered, "Published change event");
        delivered
    }

    /// Close the channel of a deleted project.
    pub async fn close(&self, project_id: &str) {
        self.broadcaster.close(&project_id.to_string()).await;
    }

    pub async fn cleanup_idle(&self) -> usize {
        self.broadcaster.cleanup_idle().await
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
