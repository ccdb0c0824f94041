use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{apply_change, ChangeEvent, MergeOutcome};
use crate::canvas::Session;

/// Background task folding remote changes of one project into a session.
///
/// Events carrying this client's own origin are skipped; they were already
/// applied optimistically when the local write was made.
pub struct ProjectSync {
    project_id: String,
    shutdown_tx: oneshot::Sender<()>,
    task_handle: tokio::task::JoinHandle<SyncStats>,
}

/// Counters reported when the task stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub applied: usize,
    pub stale: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub own: usize,
    pub lagged: u64,
}

impl ProjectSync {
    pub fn spawn(
        project_id: impl Into<String>,
        origin: Uuid,
        receiver: broadcast::Receiver<ChangeEvent>,
        session: Arc<RwLock<Session>>,
    ) -> Self {
        let project_id = project_id.into();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task_project = project_id.clone();
        let task_handle = tokio::spawn(async move {
            run(task_project, origin, receiver, session, shutdown_rx).await
        });

        debug!("ProjectSync spawned for project {}", project_id);

        Self {
            project_id,
            shutdown_tx,
            task_handle,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Wait for the channel to close on its own, e.g. after the project
    /// was deleted.
    pub async fn finished(self) -> SyncStats {
        let ProjectSync {
            project_id,
            shutdown_tx,
            task_handle,
        } = self;
        let stats = match task_handle.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!("ProjectSync task for {} failed: {}", project_id, err);
                SyncStats::default()
            }
        };
        drop(shutdown_tx);
        stats
    }

    /// Stop listening and return what was merged.
    pub async fn shutdown(self) -> SyncStats {
        let _ = self.shutdown_tx.send(());
        match self.task_handle.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!("ProjectSync task for {} failed: {}", self.project_id, err);
                SyncStats::default()
            }
        }
    }
}

async fn run(
    project_id: String,
    origin: Uuid,
    mut receiver: broadcast::Receiver<ChangeEvent>,
    session: Arc<RwLock<Session>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> SyncStats {
    let mut stats = SyncStats::default();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            received = receiver.recv() => match received {
                Ok(event) if event.origin == origin => stats.own += 1,
                Ok(event) => {
                    let outcome = {
                        let mut session = session.write().await;
                        apply_change(&mut session, &event)
                    };
                    match outcome {
                        MergeOutcome::Applied => stats.applied += 1,
                        MergeOutcome::Stale => stats.stale += 1,
                        MergeOutcome::Skipped => stats.skipped += 1,
                        MergeOutcome::Rejected(err) => {
                            warn!("Rejected remote change for project {}: {}", project_id, err);
                            stats.rejected += 1;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("ProjectSync for {} lagged, {} events dropped", project_id, missed);
                    stats.lagged += missed;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    debug!("ProjectSync for {} stopped: {:?}", project_id, stats);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::node::test_node;
    use crate::canvas::{Forest, NodeRole, Position, Project};
    use crate::sync::{ChangeFeed, ChangeKind};
    use chrono::{Duration, Utc};

    fn shared_session() -> Arc<RwLock<Session>> {
        let mut forest = Forest::new();
        forest
            .insert(test_node("a", None, NodeRole::User, 100.0, 100.0))
            .unwrap();
        let mut session = Session::from_projects(vec![Project {
            id: "p".to_string(),
            title: "Local".to_string(),
            last_modified: Utc::now(),
            forest,
            loaded: true,
        }]);
        session.select("p").unwrap();
        Arc::new(RwLock::new(session))
    }

    #[tokio::test]
    async fn merges_remote_and_skips_own_events() {
        let session = shared_session();
        let local = ChangeFeed::new();
        let remote = local.fork();

        let sync = ProjectSync::spawn(
            "p",
            local.origin(),
            local.subscribe("p").await,
            Arc::clone(&session),
        );

        let mut moved = session.read().await.project("p").unwrap().forest.get("a").unwrap().clone();
        moved.position = Position::new(5.0, 5.0);
        moved.updated_at = moved.updated_at + Duration::seconds(1);

        local.publish("p", ChangeKind::ProjectDeleted).await;
        remote
            .publish("p", ChangeKind::NodeUpserted { node: moved })
            .await;

        // the close ends the task once the queued events are drained
        local.close("p").await;
        let stats = sync.finished().await;

        assert_eq!(stats.own, 1);
        assert_eq!(stats.applied, 1);
        let session = session.read().await;
        assert!(session.project("p").is_some());
        assert_eq!(
            session.project("p").unwrap().forest.get("a").unwrap().position,
            Position::new(5.0, 5.0)
        );
    }
}
