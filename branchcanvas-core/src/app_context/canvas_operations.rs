use tracing::{info, warn};

use super::AppContext;
use crate::canvas::{auto_layout, connections, CanvasNode, Connection, Forest, Position};
use crate::database::entities::projects;
use crate::errors::{CoreError, CoreResult};
use crate::services::conversation_service::ExchangeOutcome;
use crate::services::{BatchOutcome, ConversationService, SendMessage};

impl AppContext {
    /// Copy of a project's forest, loading it first when needed.
    pub async fn forest(&self, project_id: &str) -> CoreResult<Forest> {
        self.ensure_loaded(project_id).await?;
        self.session
            .read()
            .await
            .project(project_id)
            .map(|p| p.forest.clone())
            .ok_or_else(|| CoreError::not_found("Project", project_id))
    }

    pub fn conversation_service(&self) -> &ConversationService {
        &self.conversation_service
    }

    /// Newest image of the current project.
    pub async fn latest_image(&self) -> Option<CanvasNode> {
        self.session.read().await.latest_image().cloned()
    }

    // ----- Exchanges -------------------------------------------------------

    /// Send a prompt and store the answer.
    ///
    /// With `use_context` and no upload, the parent's image (or else the
    /// newest image of the project) is sent along as editing context.
    pub async fn send_message(
        &self,
        message: SendMessage,
        use_context: bool,
    ) -> CoreResult<ExchangeOutcome> {
        let forest = self.forest(&message.project_id).await?;

        let mut message = message;
        if use_context && message.upload.is_none() && message.context_image.is_none() {
            let from_parent = message
                .parent_id
                .as_deref()
                .and_then(|id| forest.get(id))
                .filter(|n| n.has_image());
            let source = from_parent.or_else(|| forest.latest_image());
            message.context_image = source.and_then(|n| n.image_payload()).map(str::to_string);
        }

        let pending = self
            .conversation_service
            .begin_exchange(&forest, message)
            .await?;
        self.apply_exchange_node(&pending.user_node, pending.project.as_ref())
            .await;

        let outcome = self.conversation_service.complete_exchange(pending).await;
        self.apply_exchange_node(&outcome.reply, outcome.project.as_ref())
            .await;
        Ok(outcome)
    }

    pub async fn regenerate(&self, project_id: &str, node_id: &str) -> CoreResult<ExchangeOutcome> {
        let forest = self.forest(project_id).await?;
        let outcome = self
            .conversation_service
            .regenerate(&forest, project_id, node_id)
            .await?;

        self.apply_exchange_node(&outcome.user_node, None).await;
        self.apply_exchange_node(&outcome.reply, outcome.project.as_ref())
            .await;
        Ok(outcome)
    }

    // ----- Node edits ------------------------------------------------------

    /// Delete one node. Children stay where they are as new roots.
    pub async fn remove_node(&self, project_id: &str, node_id: &str) -> CoreResult<()> {
        self.ensure_loaded(project_id).await?;
        {
            let mut session = self.session.write().await;
            if let Some(project) = session.project_mut(project_id) {
                project.forest.remove(node_id);
            }
        }
        self.message_store.remove(project_id, node_id).await
    }

    pub async fn move_node(
        &self,
        project_id: &str,
        node_id: &str,
        position: Position,
    ) -> CoreResult<CanvasNode> {
        self.ensure_loaded(project_id).await?;
        {
            let mut session = self.session.write().await;
            let project = session
                .project_mut(project_id)
                .ok_or_else(|| CoreError::not_found("Project", project_id))?;
            project.forest.set_position(node_id, position)?;
        }

        let stored = self.message_store.reposition(node_id, position).await?;
        self.replace_node(&stored).await;
        Ok(stored)
    }

    /// Tidy the whole canvas and persist every new position.
    pub async fn auto_layout(&self, project_id: &str) -> CoreResult<BatchOutcome> {
        let forest = self.forest(project_id).await?;
        let positions = auto_layout(&forest, &self.layout_spacing);

        {
            let mut session = self.session.write().await;
            if let Some(project) = session.project_mut(project_id) {
                project.forest.apply_positions(&positions);
                project.touch(chrono::Utc::now());
            }
        }

        let outcome = self.message_store.reposition_batch(&positions).await;
        for node in &outcome.updated {
            self.replace_node(node).await;
        }
        if outcome.is_complete() {
            info!("Laid out {} nodes in project {}", positions.len(), project_id);
        } else {
            warn!(
                "Layout of project {} left {} nodes unsaved",
                project_id,
                outcome.failed.len()
            );
        }
        if let Err(err) = self.project_service.touch(project_id).await {
            warn!("Could not touch project {}: {}", project_id, err);
        }
        Ok(outcome)
    }

    pub async fn connections(&self, project_id: &str) -> CoreResult<Vec<Connection>> {
        let forest = self.forest(project_id).await?;
        Ok(connections(&forest))
    }

    async fn apply_exchange_node(
        &self,
        node: &CanvasNode,
        project_row: Option<&projects::Model>,
    ) {
        let mut session = self.session.write().await;
        let Some(project) = session.project_mut(&node.project_id) else {
            return;
        };
        if let Err(err) = project.forest.upsert(node.clone()) {
            warn!("Could not add node {} locally: {}", node.id, err);
        }
        match project_row {
            Some(row) => {
                project.title = row.title.clone();
                project.touch(row.last_modified);
            }
            None => project.touch(node.updated_at),
        }
    }

    async fn replace_node(&self, node: &CanvasNode) {
        let mut session = self.session.write().await;
        if let Some(project) = session.project_mut(&node.project_id) {
            if let Err(err) = project.forest.upsert(node.clone()) {
                warn!("Could not refresh node {} locally: {}", node.id, err);
            }
        }
    }
}
