//! Arena holding every node of one project.
//!
//! Nodes are stored in creation order keyed by id. The parent to children
//! index is derived on demand and dropped whenever the forest changes.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use super::{CanvasNode, Position};
use crate::errors::{CanvasError, CanvasResult};

#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: IndexMap<String, CanvasNode>,
    children: OnceCell<HashMap<String, Vec<String>>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a forest from rows already ordered by creation time.
    ///
    /// Loaded data is taken as-is: orphans whose parent was deleted are kept
    /// and treated as roots.
    pub fn from_nodes(nodes: impl IntoIterator<Item = CanvasNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            children: OnceCell::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CanvasNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &CanvasNode> {
        self.nodes.values()
    }

    /// Most recently created node.
    pub fn last(&self) -> Option<&CanvasNode> {
        self.nodes.values().last()
    }

    /// Parent of `node` if it still exists in this forest.
    pub fn parent_of(&self, node: &CanvasNode) -> Option<&CanvasNode> {
        node.parent_id.as_deref().and_then(|id| self.nodes.get(id))
    }

    /// Child ids of `id` in creation order.
    pub fn children(&self, id: &str) -> &[String] {
        self.children_index()
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sibling_count(&self, parent_id: &str) -> usize {
        self.children(parent_id).len()
    }

    /// Nodes without a parent or whose parent no longer resolves.
    pub fn roots(&self) -> Vec<&CanvasNode> {
        self.nodes
            .values()
            .filter(|n| self.parent_of(n).is_none())
            .collect()
    }

    /// Newest node that carries an image.
    pub fn latest_image(&self) -> Option<&CanvasNode> {
        self.nodes.values().rev().find(|n| n.has_image())
    }

    /// Check that `node_id` may hang below `parent_id`.
    ///
    /// The parent must exist and `node_id` must not appear on the parent's
    /// ancestor chain.
    pub fn check_attach(&self, node_id: &str, parent_id: Option<&str>) -> CanvasResult<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if !self.nodes.contains_key(parent_id) {
            return Err(CanvasError::ParentNotFound {
                node: node_id.to_string(),
                parent: parent_id.to_string(),
            });
        }
        if self.is_ancestor_or_self(node_id, parent_id) {
            return Err(CanvasError::CyclicAncestry {
                node: node_id.to_string(),
                parent: parent_id.to_string(),
            });
        }
        Ok(())
    }

    /// Add a new node after validating its parent link.
    pub fn insert(&mut self, node: CanvasNode) -> CanvasResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(CanvasError::NodeAlreadyExists(node.id));
        }
        self.check_attach(&node.id, node.parent_id.as_deref())?;
        self.nodes.insert(node.id.clone(), node);
        self.invalidate();
        Ok(())
    }

    /// Insert or replace a node coming from another writer.
    ///
    /// The parent may not have arrived yet, so only cycles are rejected.
    pub fn upsert(&mut self, node: CanvasNode) -> CanvasResult<()> {
        if let Some(parent_id) = node.parent_id.as_deref() {
            if self.is_ancestor_or_self(&node.id, parent_id) {
                return Err(CanvasError::CyclicAncestry {
                    node: node.id.clone(),
                    parent: parent_id.to_string(),
                });
            }
        }
        self.nodes.insert(node.id.clone(), node);
        self.invalidate();
        Ok(())
    }

    /// Remove exactly one node. Its children keep their `parent_id`.
    pub fn remove(&mut self, id: &str) -> Option<CanvasNode> {
        let removed = self.nodes.shift_remove(id);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    pub fn set_position(&mut self, id: &str, position: Position) -> CanvasResult<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| CanvasError::NodeNotFound(id.to_string()))?;
        node.position = position;
        Ok(())
    }

    /// Apply a batch of positions, skipping ids that are not present.
    pub fn apply_positions<'a>(
        &mut self,
        positions: impl IntoIterator<Item = (&'a String, &'a Position)>,
    ) -> usize {
        let mut applied = 0;
        for (id, position) in positions {
            if let Some(node) = self.nodes.get_mut(id) {
                node.position = *position;
                applied += 1;
            }
        }
        applied
    }

    fn is_ancestor_or_self(&self, candidate: &str, start: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            if !seen.insert(id) {
                // pre-existing loop that does not include the candidate
                return false;
            }
            current = self.nodes.get(id).and_then(|n| n.parent_id.as_deref());
        }
        false
    }

    fn children_index(&self) -> &HashMap<String, Vec<String>> {
        self.children.get_or_init(|| {
            let mut index: HashMap<String, Vec<String>> = HashMap::new();
            for node in self.nodes.values() {
                if let Some(parent) = &node.parent_id {
                    index.entry(parent.clone()).or_default().push(node.id.clone());
                }
            }
            index
        })
    }

    fn invalidate(&mut self) {
        self.children.take();
    }
}
