//! Tidy tree layout for the whole canvas.
//!
//! Leaves are stacked top to bottom in traversal order, parents are centred
//! on the span of their children and each depth level gets its own column.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::{Forest, Position};

/// Card footprint and gaps used by [`auto_layout`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSpacing {
    pub node_width: f64,
    pub node_height: f64,
    pub gap_x: f64,
    pub gap_y: f64,
}

impl Default for LayoutSpacing {
    fn default() -> Self {
        Self {
            node_width: 450.0,
            node_height: 400.0,
            gap_x: 50.0,
            gap_y: 50.0,
        }
    }
}

impl LayoutSpacing {
    fn column_width(&self) -> f64 {
        self.node_width + self.gap_x
    }

    fn row_height(&self) -> f64 {
        self.node_height + self.gap_y
    }
}

/// Compute a position for every node of `forest`.
///
/// Roots are laid out in creation order and each tree is followed by an
/// extra `node_height` of space. Every node is visited once, so a corrupt
/// forest containing a loop still terminates; nodes only reachable through
/// such a loop are laid out as additional roots.
#[must_use]
pub fn auto_layout(forest: &Forest, spacing: &LayoutSpacing) -> IndexMap<String, Position> {
    let mut walk = Walk {
        forest,
        spacing,
        placed: IndexMap::with_capacity(forest.len()),
        visited: HashSet::with_capacity(forest.len()),
    };

    let mut cursor = 0.0;
    for root in forest.roots() {
        cursor = walk.tree(&root.id, cursor);
    }
    let leftovers: Vec<&str> = forest
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !walk.visited.contains(id))
        .collect();
    for id in leftovers {
        if !walk.visited.contains(id) {
            cursor = walk.tree(id, cursor);
        }
    }

    walk.placed
}

struct Walk<'a> {
    forest: &'a Forest,
    spacing: &'a LayoutSpacing,
    placed: IndexMap<String, Position>,
    visited: HashSet<&'a str>,
}

impl<'a> Walk<'a> {
    /// Lay out one tree and return the cursor for the next one.
    fn tree(&mut self, root: &'a str, cursor: f64) -> f64 {
        let (_, cursor) = self.node(root, 0, cursor);
        cursor + self.spacing.node_height
    }

    /// Returns the node's y and the advanced cursor.
    fn node(&mut self, id: &'a str, depth: usize, cursor: f64) -> (f64, f64) {
        self.visited.insert(id);
        let x = depth as f64 * self.spacing.column_width();

        let mut cursor = cursor;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let forest = self.forest;
        for child in forest.children(id) {
            if self.visited.contains(child.as_str()) {
                continue;
            }
            let (child_y, next) = self.node(child.as_str(), depth + 1, cursor);
            cursor = next;
            min_y = min_y.min(child_y);
            max_y = max_y.max(child_y);
        }

        let y = if min_y.is_finite() {
            (min_y + max_y) / 2.0
        } else {
            let y = cursor;
            cursor += self.spacing.row_height();
            y
        };
        self.placed.insert(id.to_string(), Position::new(x, y));
        (y, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::node::test_node;
    use crate::canvas::NodeRole;

    fn forest(edges: &[(&str, Option<&str>)]) -> Forest {
        Forest::from_nodes(
            edges
                .iter()
                .map(|(id, parent)| test_node(id, *parent, NodeRole::User, 0.0, 0.0)),
        )
    }

    #[test]
    fn chain_steps_one_column_per_depth() {
        let forest = forest(&[("a", None), ("b", Some("a")), ("c", Some("b"))]);
        let layout = auto_layout(&forest, &LayoutSpacing::default());

        assert_eq!(layout["a"], Position::new(0.0, 0.0));
        assert_eq!(layout["b"], Position::new(500.0, 0.0));
        assert_eq!(layout["c"], Position::new(1000.0, 0.0));
    }

    #[test]
    fn parent_is_centred_on_children() {
        let forest = forest(&[
            ("r", None),
            ("c1", Some("r")),
            ("c2", Some("r")),
            ("c3", Some("r")),
        ]);
        let layout = auto_layout(&forest, &LayoutSpacing::default());

        assert_eq!(layout["c1"].y, 0.0);
        assert_eq!(layout["c2"].y, 450.0);
        assert_eq!(layout["c3"].y, 900.0);
        assert_eq!(layout["r"].y, 450.0);
        assert_eq!(layout["r"].x, 0.0);
    }

    #[test]
    fn separate_trees_leave_extra_gap() {
        let forest = forest(&[("a", None), ("b", None)]);
        let layout = auto_layout(&forest, &LayoutSpacing::default());

        assert_eq!(layout["a"], Position::new(0.0, 0.0));
        // leaf advance (450) plus the tree gap (400)
        assert_eq!(layout["b"], Position::new(0.0, 850.0));
    }

    #[test]
    fn orphan_is_laid_out_as_root() {
        let forest = forest(&[("a", None), ("b", Some("deleted"))]);
        let layout = auto_layout(&forest, &LayoutSpacing::default());

        assert_eq!(layout.len(), 2);
        assert_eq!(layout["b"].x, 0.0);
    }

    #[test]
    fn loop_without_root_terminates_and_visits_once() {
        let forest = forest(&[("a", Some("b")), ("b", Some("a")), ("c", None)]);
        let layout = auto_layout(&forest, &LayoutSpacing::default());

        assert_eq!(layout.len(), 3);
        assert!(layout.contains_key("a"));
        assert!(layout.contains_key("b"));
    }

    #[test]
    fn custom_spacing_is_honoured() {
        let spacing = LayoutSpacing {
            node_width: 100.0,
            node_height: 50.0,
            gap_x: 10.0,
            gap_y: 5.0,
        };
        let forest = forest(&[("a", None), ("b", Some("a")), ("c", Some("a"))]);
        let layout = auto_layout(&forest, &spacing);

        assert_eq!(layout["b"], Position::new(110.0, 0.0));
        assert_eq!(layout["c"], Position::new(110.0, 55.0));
        assert_eq!(layout["a"], Position::new(0.0, 27.5));
    }
}
