//! Initial placement of freshly appended nodes.

use super::{Forest, Position};

/// Horizontal distance between a parent card and its children.
pub const HORIZONTAL_GAP: f64 = 450.0;

/// Vertical step between siblings of the same parent.
pub const VERTICAL_GAP: f64 = 250.0;

/// Position of the first node of an empty project.
pub const ORIGIN: Position = Position::new(100.0, 100.0);

/// Compute where a new node attached to `parent_id` should appear.
///
/// With a resolvable parent the node goes one column to the right and one
/// row below the last existing sibling. Without one it is placed to the
/// right of the rightmost node. Never fails.
#[must_use]
pub fn place_node(forest: &Forest, parent_id: Option<&str>) -> Position {
    match parent_id.and_then(|id| forest.get(id)) {
        Some(parent) => {
            let siblings = forest.sibling_count(&parent.id) as f64;
            Position::new(
                parent.position.x + HORIZONTAL_GAP,
                parent.position.y + siblings * VERTICAL_GAP,
            )
        }
        None if forest.is_empty() => ORIGIN,
        None => {
            let mut rightmost = Position::default();
            for node in forest.iter() {
                if node.position.x > rightmost.x {
                    rightmost = node.position;
                }
            }
            Position::new(rightmost.x + HORIZONTAL_GAP, rightmost.y)
        }
    }
}
