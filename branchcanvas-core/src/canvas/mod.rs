//! Branching conversation canvas.
//!
//! A project holds a forest of message nodes. Each node may point at a
//! parent in the same project, so one conversation can fork into several
//! branches that are drawn side by side on a 2D canvas.
//!
//! The modules here are pure: they operate on an in-memory [`Forest`] and
//! never touch persistence. The services layer feeds them with rows loaded
//! from the database and writes their results back.

pub mod connection;
pub mod forest;
pub mod layout;
pub mod node;
pub mod placement;
pub mod position;
pub mod project;
pub mod regenerate;
pub mod session;

pub use connection::{connections, Connection};
pub use forest::Forest;
pub use layout::{auto_layout, LayoutSpacing};
pub use node::{CanvasNode, NodeRole};
pub use placement::{place_node, HORIZONTAL_GAP, ORIGIN, VERTICAL_GAP};
pub use position::Position;
pub use project::Project;
pub use regenerate::{plan_regeneration, RegenerationPlan};
pub use session::Session;
