//! Last-write-wins merge of remote changes into local state.

use crate::canvas::{Forest, Project, Session};
use crate::errors::CanvasError;

use super::{ChangeEvent, ChangeKind};

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Applied,
    /// Local state is newer than the change.
    Stale,
    /// Project not loaded here; the change arrives with the next load.
    Skipped,
    Rejected(CanvasError),
}

/// Fold one remote change into `session`.
///
/// Nodes are compared by `updated_at` and projects by `last_modified`. Ties
/// go to the incoming change.
pub fn apply_change(session: &mut Session, event: &ChangeEvent) -> MergeOutcome {
    let project_id = event.project_id.as_str();

    match &event.kind {
        ChangeKind::ProjectDeleted => match session.remove_project(project_id) {
            Some(_) => MergeOutcome::Applied,
            None => MergeOutcome::Stale,
        },
        ChangeKind::ProjectUpdated {
            title,
            last_modified,
        } => match session.project_mut(project_id) {
            Some(project) if *last_modified < project.last_modified => MergeOutcome::Stale,
            Some(project) => {
                project.title = title.clone();
                project.last_modified = *last_modified;
                MergeOutcome::Applied
            }
            None => {
                session.upsert_project(Project {
                    id: project_id.to_string(),
                    title: title.clone(),
                    last_modified: *last_modified,
                    forest: Forest::new(),
                    loaded: false,
                });
                MergeOutcome::Applied
            }
        },
        ChangeKind::NodeUpserted { node } => {
            let Some(project) = session.project_mut(project_id).filter(|p| p.loaded) else {
                return MergeOutcome::Skipped;
            };
            if let Some(local) = project.forest.get(&node.id) {
                if local.updated_at > node.updated_at {
                    return MergeOutcome::Stale;
                }
            }
            match project.forest.upsert(node.clone()) {
                Ok(()) => MergeOutcome::Applied,
                Err(err) => MergeOutcome::Rejected(err),
            }
        }
        ChangeKind::NodeRemoved { node_id, at } => {
            let Some(project) = session.project_mut(project_id).filter(|p| p.loaded) else {
                return MergeOutcome::Skipped;
            };
            match project.forest.get(node_id) {
                None => MergeOutcome::Stale,
                Some(local) if local.updated_at > *at => MergeOutcome::Stale,
                Some(_) => {
                    project.forest.remove(node_id);
                    MergeOutcome::Applied
                }
            }
        }
    }
}
