use chrono::{DateTime, Utc};

use super::{CanvasNode, Forest};
use crate::database::entities::projects;

/// A project together with its loaded message forest.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub last_modified: DateTime<Utc>,
    pub forest: Forest,
    /// Whether `forest` reflects the stored messages yet.
    pub loaded: bool,
}

impl Project {
    pub fn latest_image(&self) -> Option<&CanvasNode> {
        self.forest.latest_image()
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_modified {
            self.last_modified = at;
        }
    }
}

impl From<projects::Model> for Project {
    fn from(row: projects::Model) -> Self {
        Self {
            id: row.id,
            title: row.title,
            last_modified: row.last_modified,
            forest: Forest::new(),
            loaded: false,
        }
    }
}
