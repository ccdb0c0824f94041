//! Curves linking each parent card to its children.

use serde::Serialize;

use super::{Forest, Position};

/// Rendered width of a card; curves leave from its right edge.
pub const CARD_WIDTH: f64 = 380.0;

/// Vertical offset of the anchor point below a card's top edge.
pub const ANCHOR_OFFSET_Y: f64 = 60.0;

/// Lower bound for the horizontal pull of the control points.
pub const MIN_CONTROL_OFFSET: f64 = 100.0;

/// Cubic Bezier from a parent's right edge to a child's left edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub parent_id: String,
    pub child_id: String,
    pub start: Position,
    pub control1: Position,
    pub control2: Position,
    pub end: Position,
}

impl Connection {
    pub fn between(
        parent_id: impl Into<String>,
        parent: Position,
        child_id: impl Into<String>,
        child: Position,
    ) -> Self {
        let start = parent.offset(CARD_WIDTH, ANCHOR_OFFSET_Y);
        let end = child.offset(0.0, ANCHOR_OFFSET_Y);
        let pull = ((end.x - start.x).abs() * 0.5).max(MIN_CONTROL_OFFSET);

        Self {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
            start,
            control1: Position::new(start.x + pull, start.y),
            control2: Position::new(end.x - pull, end.y),
            end,
        }
    }

    /// SVG path data, e.g. `M 480 160 C 580 160, 450 160, 550 160`.
    pub fn svg_path(&self) -> String {
        format!(
            "M {} {} C {} {}, {} {}, {} {}",
            self.start.x,
            self.start.y,
            self.control1.x,
            self.control1.y,
            self.control2.x,
            self.control2.y,
            self.end.x,
            self.end.y
        )
    }
}

/// One connection per node whose parent resolves, in creation order.
pub fn connections(forest: &Forest) -> Vec<Connection> {
    forest
        .iter()
        .filter_map(|child| {
            forest
                .parent_of(child)
                .map(|parent| Connection::between(&parent.id, parent.position, &child.id, child.position))
        })
        .collect()
}
