//! Persistence of canvas nodes.
//!
//! Callers pass the forest they currently hold so that placement and the
//! structural checks see the same state the user sees.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::canvas::{place_node, CanvasNode, Forest, NodeRole, Position};
use crate::database::entities::{messages, projects};
use crate::errors::{CoreError, CoreResult};
use crate::services::ValidationService;
use crate::sync::{ChangeFeed, ChangeKind};

/// A node about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub project_id: String,
    pub role: NodeRole,
    pub text: String,
    pub image_url: Option<String>,
    pub aspect_ratio: Option<String>,
    pub parent_id: Option<String>,
    /// Explicit coordinates; computed by placement when absent.
    pub position: Option<Position>,
}

impl NewNode {
    pub fn new(project_id: impl Into<String>, role: NodeRole, text: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            role,
            text: text.into(),
            image_url: None,
            aspect_ratio: None,
            parent_id: None,
            position: None,
        }
    }

    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<String>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub node_id: String,
    pub message: String,
}

/// Result of a bulk reposition. Successful updates are kept even when
/// others fail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub updated: Vec<CanvasNode>,
    pub failed: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct MessageStore {
    db: DatabaseConnection,
    feed: Option<ChangeFeed>,
}

impl MessageStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, feed: None }
    }

    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// All nodes of a project in creation order.
    pub async fn load_forest(&self, project_id: &str) -> CoreResult<Forest> {
        let rows = messages::Entity::find()
            .filter(messages::Column::ProjectId.eq(project_id))
            .order_by_asc(messages::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::database("load messages", e))?;

        let nodes = rows
            .into_iter()
            .map(CanvasNode::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Forest::from_nodes(nodes))
    }

    pub async fn get(&self, node_id: &str) -> CoreResult<CanvasNode> {
        let row = messages::Entity::find_by_id(node_id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("load message", e))?
            .ok_or_else(|| CoreError::not_found("Node", node_id))?;
        Ok(CanvasNode::try_from(row)?)
    }

    /// Persist a new node and return it with its assigned id and timestamp.
    ///
    /// The parent must exist in `forest`. Without an explicit position the
    /// node is placed relative to its parent.
    pub async fn append(&self, forest: &Forest, draft: NewNode) -> CoreResult<CanvasNode> {
        if let Some(url) = draft.image_url.as_deref() {
            ValidationService::validate_image_url(url)?;
        }
        if let Some(ratio) = draft.aspect_ratio.as_deref() {
            ValidationService::validate_aspect_ratio(ratio)?;
        }

        let id = Uuid::new_v4().to_string();
        forest.check_attach(&id, draft.parent_id.as_deref())?;

        projects::Entity::find_by_id(draft.project_id.clone())
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("load project", e))?
            .ok_or_else(|| CoreError::not_found("Project", &draft.project_id))?;

        let position = draft
            .position
            .unwrap_or_else(|| place_node(forest, draft.parent_id.as_deref()));
        let created_at = self.next_timestamp(&draft.project_id).await?;

        let row = messages::ActiveModel {
            id: Set(id),
            project_id: Set(draft.project_id),
            author_role: Set(draft.role.as_str().to_string()),
            content: Set(draft.text),
            image_url: Set(draft.image_url),
            aspect_ratio: Set(draft.aspect_ratio),
            parent_id: Set(draft.parent_id),
            position_x: Set(position.x),
            position_y: Set(position.y),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        }
        .insert(&self.db)
        .await
        .map_err(|e| CoreError::database("insert message", e))?;

        let node = CanvasNode::try_from(row)?;
        debug!(
            "Appended {} node {} to project {} at ({}, {})",
            node.role, node.id, node.project_id, node.position.x, node.position.y
        );
        self.publish(&node.project_id, ChangeKind::NodeUpserted { node: node.clone() })
            .await;
        Ok(node)
    }

    /// Delete one node. Its children keep pointing at the removed id.
    pub async fn remove(&self, project_id: &str, node_id: &str) -> CoreResult<()> {
        let result = messages::Entity::delete_many()
            .filter(messages::Column::Id.eq(node_id))
            .filter(messages::Column::ProjectId.eq(project_id))
            .exec(&self.db)
            .await
            .map_err(|e| CoreError::database("delete message", e))?;

        if result.rows_affected == 0 {
            return Err(CoreError::not_found("Node", node_id));
        }

        debug!("Removed node {} from project {}", node_id, project_id);
        self.publish(
            project_id,
            ChangeKind::NodeRemoved {
                node_id: node_id.to_string(),
                at: Utc::now(),
            },
        )
        .await;
        Ok(())
    }

    pub async fn reposition(&self, node_id: &str, position: Position) -> CoreResult<CanvasNode> {
        let row = messages::Entity::find_by_id(node_id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("load message", e))?
            .ok_or_else(|| CoreError::not_found("Node", node_id))?;

        let previous = row.updated_at;
        let mut active: messages::ActiveModel = row.into();
        active.position_x = Set(position.x);
        active.position_y = Set(position.y);
        active.updated_at = Set(after(previous, Utc::now()));

        let row = active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("update message position", e))?;

        let node = CanvasNode::try_from(row)?;
        self.publish(&node.project_id, ChangeKind::NodeUpserted { node: node.clone() })
            .await;
        Ok(node)
    }

    /// Update many positions concurrently, one request per node.
    ///
    /// Failures are collected per node; updates that succeeded stay applied.
    pub async fn reposition_batch(&self, positions: &IndexMap<String, Position>) -> BatchOutcome {
        let updates = positions
            .iter()
            .map(|(id, position)| async move { (id, self.reposition(id, *position).await) });

        let mut outcome = BatchOutcome::default();
        for (id, result) in join_all(updates).await {
            match result {
                Ok(node) => outcome.updated.push(node),
                Err(err) => {
                    warn!("Failed to reposition node {}: {}", id, err);
                    outcome.failed.push(BatchFailure {
                        node_id: id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        debug!(
            "Batch reposition: {} updated, {} failed",
            outcome.updated.len(),
            outcome.failed.len()
        );
        outcome
    }

    /// Creation time strictly after the newest node of the project.
    async fn next_timestamp(&self, project_id: &str) -> CoreResult<DateTime<Utc>> {
        let newest = messages::Entity::find()
            .filter(messages::Column::ProjectId.eq(project_id))
            .order_by_desc(messages::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("load newest message", e))?;

        let now = Utc::now();
        Ok(match newest {
            Some(row) => after(row.created_at, now),
            None => now,
        })
    }

    async fn publish(&self, project_id: &str, kind: ChangeKind) {
        if let Some(feed) = &self.feed {
            feed.publish(project_id, kind).await;
        }
    }
}

fn after(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}
