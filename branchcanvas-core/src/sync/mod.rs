//! Change notifications and last-write-wins merging of remote edits.
//!
//! Every persisted mutation is published as a [`ChangeEvent`] on a
//! per-project channel. A [`ProjectSync`] task listens on that channel and
//! folds events written by other clients into the local [`Session`].
//!
//! [`Session`]: crate::canvas::Session

pub mod events;
pub mod merge;
pub mod project_sync;

pub use events::{ChangeEvent, ChangeFeed, ChangeKind};
pub use merge::{apply_change, MergeOutcome};
pub use project_sync::ProjectSync;
