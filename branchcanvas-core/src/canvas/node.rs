use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Position;
use crate::database::entities::messages;
use crate::errors::CanvasError;

/// Author of a message node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    User,
    Model,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::User => "user",
            NodeRole::Model => "model",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(NodeRole::User),
            "model" => Ok(NodeRole::Model),
            other => Err(CanvasError::Validation(format!(
                "Unknown author role '{}'",
                other
            ))),
        }
    }
}

/// One message on the canvas.
///
/// `id` and `created_at` are assigned when the node is persisted and never
/// change afterwards. `updated_at` moves on every position change and is the
/// clock used when merging concurrent edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    pub id: String,
    pub project_id: String,
    pub role: NodeRole,
    pub text: String,
    pub image_url: Option<String>,
    pub aspect_ratio: Option<String>,
    pub parent_id: Option<String>,
    pub position: Position,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanvasNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Base64 payload of an inline `data:` image URL.
    pub fn image_payload(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .and_then(|url| url.split_once(','))
            .map(|(_, payload)| payload)
    }
}

impl TryFrom<messages::Model> for CanvasNode {
    type Error = CanvasError;

    fn try_from(row: messages::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            role: row.author_role.parse()?,
            id: row.id,
            project_id: row.project_id,
            text: row.content,
            image_url: row.image_url,
            aspect_ratio: row.aspect_ratio,
            parent_id: row.parent_id,
            position: Position::new(row.position_x, row.position_y),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_lowercase_names() {
        assert_eq!("user".parse::<NodeRole>().unwrap(), NodeRole::User);
        assert_eq!("model".parse::<NodeRole>().unwrap(), NodeRole::Model);
        assert!("assistant".parse::<NodeRole>().is_err());
    }

    #[test]
    fn image_payload_strips_data_url_prefix() {
        let now = Utc::now();
        let node = CanvasNode {
            id: "n1".to_string(),
            project_id: "p1".to_string(),
            role: NodeRole::Model,
            text: String::new(),
            image_url: Some("data:image/png;base64,QUJD".to_string()),
            aspect_ratio: None,
            parent_id: None,
            position: Position::default(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(node.image_payload(), Some("QUJD"));
        assert!(node.has_image());
    }
}

#[cfg(test)]
pub(crate) fn test_node(id: &str, parent: Option<&str>, role: NodeRole, x: f64, y: f64) -> CanvasNode {
    let now = Utc::now();
    CanvasNode {
        id: id.to_string(),
        project_id: "project".to_string(),
        role,
        text: format!("text of {}", id),
        image_url: None,
        aspect_ratio: None,
        parent_id: parent.map(str::to_string),
        position: Position::new(x, y),
        created_at: now,
        updated_at: now,
    }
}
