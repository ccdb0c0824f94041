//! One prompt/answer exchange on the canvas.
//!
//! An exchange stores the user's node first, because the model node needs
//! its persisted id as parent, then calls the generator and stores the
//! answer. Only invalid input is returned as an error. Storage and
//! generation failures become an error node in place of the answer.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::canvas::{
    place_node, plan_regeneration, CanvasNode, Forest, NodeRole, Position, HORIZONTAL_GAP,
};
use crate::database::entities::projects;
use crate::errors::{CoreErrorKind, CoreResult};
use crate::services::generation::{AspectRatio, GenerationRequest, ImageGenerator};
use crate::services::{BillingService, MessageStore, NewNode, ProjectService, ValidationService};

pub const IMAGE_ONLY_REPLY: &str = "Image generated";
pub const EMPTY_REPLY: &str = "Processed that";
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, PartialEq)]
pub struct SendMessage {
    pub project_id: String,
    pub prompt: String,
    pub parent_id: Option<String>,
    /// Without an explicit parent, hang the prompt under the newest node.
    pub attach_to_last: bool,
    /// Freshly uploaded image, base64 without prefix.
    pub upload: Option<String>,
    /// Image taken from the conversation as editing context.
    pub context_image: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
}

impl SendMessage {
    pub fn new(project_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            prompt: prompt.into(),
            parent_id: None,
            attach_to_last: true,
            upload: None,
            context_image: None,
            aspect_ratio: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_upload(mut self, base64: impl Into<String>) -> Self {
        self.upload = Some(base64.into());
        self
    }

    pub fn with_context_image(mut self, base64: Option<String>) -> Self {
        self.context_image = base64;
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    /// The upload wins over context.
    pub fn image_payload(&self) -> Option<&str> {
        self.upload.as_deref().or(self.context_image.as_deref())
    }

    pub fn is_context_image(&self) -> bool {
        self.upload.is_none() && self.context_image.is_some()
    }

    fn effective_parent(&self, forest: &Forest) -> Option<String> {
        match &self.parent_id {
            Some(id) => Some(id.clone()),
            None if self.attach_to_last => forest.last().map(|n| n.id.clone()),
            None => None,
        }
    }
}

/// User node stored, answer not yet generated.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    /// Stored user node, or a local-only one when storing it failed.
    pub user_node: CanvasNode,
    /// Project row after the title and timestamp updates.
    pub project: Option<projects::Model>,
    /// Storage failure that ends the exchange before generation.
    pub failure: Option<String>,
    persisted: bool,
    forest: Forest,
    request: GenerationRequest,
}

#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub user_node: CanvasNode,
    /// Stored answer, or the local-only error node.
    pub reply: CanvasNode,
    pub error: Option<String>,
    pub project: Option<projects::Model>,
}

impl ExchangeOutcome {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Clone)]
pub struct ConversationService {
    store: MessageStore,
    projects: ProjectService,
    billing: BillingService,
    generator: Arc<dyn ImageGenerator>,
    user_id: String,
}

impl ConversationService {
    pub fn new(
        store: MessageStore,
        projects: ProjectService,
        billing: BillingService,
        generator: Arc<dyn ImageGenerator>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            projects,
            billing,
            generator,
            user_id: user_id.into(),
        }
    }

    pub async fn send_message(
        &self,
        forest: &Forest,
        message: SendMessage,
    ) -> CoreResult<ExchangeOutcome> {
        let pending = self.begin_exchange(forest, message).await?;
        Ok(self.complete_exchange(pending).await)
    }

    /// Re-send the prompt behind `node_id` as a new branch.
    pub async fn regenerate(
        &self,
        forest: &Forest,
        project_id: &str,
        node_id: &str,
    ) -> CoreResult<ExchangeOutcome> {
        let plan = plan_regeneration(forest, node_id)?;
        info!("Regenerating node {} in project {}", node_id, project_id);

        let mut message = SendMessage::new(project_id, plan.prompt.clone())
            .with_context_image(plan.image_payload().map(str::to_string))
            .with_aspect_ratio(AspectRatio::Square);
        message.parent_id = plan.parent_id.clone();
        message.attach_to_last = false;

        self.send_message(forest, message).await
    }

    /// Validate and store the user node, retitle a fresh project and bump
    /// its modification time.
    pub async fn begin_exchange(
        &self,
        forest: &Forest,
        message: SendMessage,
    ) -> CoreResult<PendingExchange> {
        ValidationService::validate_prompt(&message.prompt)?;
        if let Some(payload) = message.image_payload() {
            ValidationService::validate_base64(payload)?;
        }

        let stored_image = match (&message.upload, message.is_context_image()) {
            (Some(upload), false) => Some(format!("data:image/png;base64,{}", upload)),
            _ => None,
        };

        let draft = NewNode::new(&message.project_id, NodeRole::User, message.prompt.clone())
            .with_parent(message.effective_parent(forest))
            .with_image(stored_image)
            .with_aspect_ratio(message.aspect_ratio.map(|r| r.to_string()));
        let request = GenerationRequest {
            prompt: message.prompt.clone(),
            image_base64: message.image_payload().map(str::to_string),
            aspect_ratio: message.aspect_ratio,
        };

        let user_node = match self.store.append(forest, draft.clone()).await {
            Ok(node) => node,
            // missing parents and cycles stay write-time errors
            Err(err) if err.kind() == CoreErrorKind::Validation => return Err(err),
            Err(err) => {
                warn!("Could not store prompt in project {}: {}", message.project_id, err);
                let user_node = unsaved_node(forest, &draft);
                let mut forest = forest.clone();
                forest.upsert(user_node.clone())?;
                return Ok(PendingExchange {
                    user_node,
                    project: None,
                    failure: Some(err.to_string()),
                    persisted: false,
                    forest,
                    request,
                });
            }
        };

        if forest.is_empty() {
            let title = ValidationService::auto_title(&message.prompt);
            if let Err(err) = self.projects.rename(&message.project_id, &title).await {
                warn!("Could not title project {}: {}", message.project_id, err);
            }
        }
        let (project, failure) = match self.projects.touch(&message.project_id).await {
            Ok(project) => (Some(project), None),
            Err(err) => {
                warn!("Could not touch project {}: {}", message.project_id, err);
                (None, Some(err.to_string()))
            }
        };

        let mut forest = forest.clone();
        forest.upsert(user_node.clone())?;

        Ok(PendingExchange {
            user_node,
            project,
            failure,
            persisted: true,
            forest,
            request,
        })
    }

    /// Generate and store the answer for a pending exchange.
    pub async fn complete_exchange(&self, pending: PendingExchange) -> ExchangeOutcome {
        let PendingExchange {
            user_node,
            mut project,
            failure,
            persisted,
            forest,
            request,
        } = pending;
        let reply_position = user_node.position.offset(HORIZONTAL_GAP, 0.0);
        let aspect_ratio = request.aspect_ratio.map(|r| r.to_string());

        if let Some(message) = failure {
            // an unsaved prompt has no id to hang the answer on
            let parent_id = if persisted {
                Some(user_node.id.clone())
            } else {
                user_node.parent_id.clone()
            };
            let reply = error_node(&user_node, parent_id, reply_position, &message);
            return ExchangeOutcome {
                user_node,
                reply,
                error: Some(message),
                project,
            };
        }

        let stored = match self.generator.generate(request).await {
            Ok(response) => {
                let text = match (&response.text, &response.image_url) {
                    (Some(text), _) => text.clone(),
                    (None, Some(_)) => IMAGE_ONLY_REPLY.to_string(),
                    (None, None) => EMPTY_REPLY.to_string(),
                };
                let draft = NewNode::new(&user_node.project_id, NodeRole::Model, text)
                    .with_parent(Some(user_node.id.clone()))
                    .with_image(response.image_url)
                    .with_aspect_ratio(aspect_ratio)
                    .at(reply_position);
                self.store.append(&forest, draft).await.map_err(|e| e.to_string())
            }
            Err(err) => Err(err.to_string()),
        };

        match stored {
            Ok(reply) => {
                match self.projects.touch(&user_node.project_id).await {
                    Ok(touched) => project = Some(touched),
                    Err(err) => warn!("Could not touch project {}: {}", user_node.project_id, err),
                }
                if let Err(err) = self
                    .billing
                    .debit_generation(&self.user_id, &user_node.project_id)
                    .await
                {
                    warn!("Could not debit credits for {}: {}", self.user_id, err);
                }
                ExchangeOutcome {
                    user_node,
                    reply,
                    error: None,
                    project,
                }
            }
            Err(message) => {
                warn!(
                    "Generation via {} failed for node {}: {}",
                    self.generator.name(),
                    user_node.id,
                    message
                );
                let parent_id = Some(user_node.id.clone());
                let reply = error_node(&user_node, parent_id, reply_position, &message);
                ExchangeOutcome {
                    user_node,
                    reply,
                    error: Some(message),
                    project,
                }
            }
        }
    }
}

/// Answer shown in place of a failed exchange. It is not persisted.
fn error_node(
    user_node: &CanvasNode,
    parent_id: Option<String>,
    position: Position,
    message: &str,
) -> CanvasNode {
    let now = Utc::now();
    CanvasNode {
        id: Uuid::new_v4().to_string(),
        project_id: user_node.project_id.clone(),
        role: NodeRole::Model,
        text: format!("{}{}", ERROR_PREFIX, message),
        image_url: None,
        aspect_ratio: user_node.aspect_ratio.clone(),
        parent_id,
        position,
        created_at: now,
        updated_at: now,
    }
}

/// Local stand-in for a user node that could not be stored.
fn unsaved_node(forest: &Forest, draft: &NewNode) -> CanvasNode {
    let now = Utc::now();
    CanvasNode {
        id: Uuid::new_v4().to_string(),
        project_id: draft.project_id.clone(),
        role: draft.role,
        text: draft.text.clone(),
        image_url: draft.image_url.clone(),
        aspect_ratio: draft.aspect_ratio.clone(),
        parent_id: draft.parent_id.clone(),
        position: draft
            .position
            .unwrap_or_else(|| place_node(forest, draft.parent_id.as_deref())),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_is_not_context() {
        let message = SendMessage::new("p", "hi")
            .with_upload("UPLOAD")
            .with_context_image(Some("CONTEXT".to_string()));
        assert_eq!(message.image_payload(), Some("UPLOAD"));
        assert!(!message.is_context_image());

        let message = SendMessage::new("p", "hi").with_context_image(Some("CONTEXT".to_string()));
        assert_eq!(message.image_payload(), Some("CONTEXT"));
        assert!(message.is_context_image());
    }

    #[test]
    fn default_parent_is_newest_node() {
        use crate::canvas::node::test_node;

        let forest = Forest::from_nodes(vec![
            test_node("a", None, NodeRole::User, 0.0, 0.0),
            test_node("b", Some("a"), NodeRole::Model, 0.0, 0.0),
        ]);
        let message = SendMessage::new("p", "hi");
        assert_eq!(message.effective_parent(&forest).as_deref(), Some("b"));

        let mut detached = SendMessage::new("p", "hi");
        detached.attach_to_last = false;
        assert_eq!(detached.effective_parent(&forest), None);

        let explicit = SendMessage::new("p", "hi").with_parent("a");
        assert_eq!(explicit.effective_parent(&forest).as_deref(), Some("a"));
    }

    #[test]
    fn error_node_sits_right_of_prompt() {
        use crate::canvas::node::test_node;

        let user = test_node("u", None, NodeRole::User, 100.0, 100.0);
        let node = error_node(&user, Some(user.id.clone()), user.position.offset(HORIZONTAL_GAP, 0.0), "boom");
        assert_eq!(node.text, "Error: boom");
        assert_eq!(node.parent_id.as_deref(), Some("u"));
        assert_eq!(node.position, Position::new(550.0, 100.0));
        assert_eq!(node.role, NodeRole::Model);
    }
}
