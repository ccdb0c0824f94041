//! Re-run a previous exchange as a new sibling branch.

use super::{Forest, NodeRole};
use crate::errors::{CanvasError, CanvasResult};

/// Inputs for re-sending the prompt behind an existing node.
#[derive(Debug, Clone, PartialEq)]
pub struct RegenerationPlan {
    pub prompt: String,
    /// Image attached to the original prompt, as stored on the node.
    pub image_url: Option<String>,
    /// Parent for the new user node.
    pub parent_id: Option<String>,
    /// The image is editing context and is not stored again on the user node.
    pub is_context_image: bool,
}

impl RegenerationPlan {
    /// Base64 part of the stored image.
    pub fn image_payload(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .and_then(|url| url.split_once(','))
            .map(|(_, payload)| payload)
    }
}

/// Work out what to send when regenerating from `node_id`.
///
/// A model node replays the user prompt that produced it and hangs the new
/// branch under that prompt's parent. A user node replays itself.
pub fn plan_regeneration(forest: &Forest, node_id: &str) -> CanvasResult<RegenerationPlan> {
    let node = forest
        .get(node_id)
        .ok_or_else(|| CanvasError::NodeNotFound(node_id.to_string()))?;

    let source = match node.role {
        NodeRole::Model => forest.parent_of(node).ok_or_else(|| CanvasError::ParentNotFound {
            node: node.id.clone(),
            parent: node.parent_id.clone().unwrap_or_default(),
        })?,
        NodeRole::User => node,
    };

    if source.text.trim().is_empty() {
        return Err(CanvasError::NothingToRegenerate(node_id.to_string()));
    }

    Ok(RegenerationPlan {
        prompt: source.text.clone(),
        image_url: source.image_url.clone(),
        parent_id: source.parent_id.clone(),
        is_context_image: true,
    })
}
