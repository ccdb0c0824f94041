use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{debug, info};

use crate::database::entities::{messages, projects};
use crate::errors::{CoreError, CoreResult};
use crate::services::ValidationService;
use crate::sync::{ChangeFeed, ChangeKind};

pub const DEFAULT_PROJECT_TITLE: &str = "New Project";

#[derive(Clone)]
pub struct ProjectService {
    db: DatabaseConnection,
    feed: Option<ChangeFeed>,
}

impl ProjectService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, feed: None }
    }

    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Create a project; a missing title falls back to "New Project".
    pub async fn create(&self, title: Option<&str>) -> CoreResult<projects::Model> {
        let title = match title {
            Some(title) => ValidationService::validate_title(title)?,
            None => DEFAULT_PROJECT_TITLE.to_string(),
        };

        let project = projects::ActiveModel::new(title)
            .insert(&self.db)
            .await
            .map_err(|e| CoreError::database("create project", e))?;

        info!("Created project {} ({})", project.id, project.title);
        self.announce(&project).await;
        Ok(project)
    }

    /// All projects, most recently modified first.
    pub async fn list(&self) -> CoreResult<Vec<projects::Model>> {
        projects::Entity::find()
            .order_by_desc(projects::Column::LastModified)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::database("list projects", e))
    }

    pub async fn get(&self, id: &str) -> CoreResult<projects::Model> {
        projects::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("load project", e))?
            .ok_or_else(|| CoreError::not_found("Project", id))
    }

    pub async fn rename(&self, id: &str, title: &str) -> CoreResult<projects::Model> {
        let title = ValidationService::validate_title(title)?;
        let project = self.get(id).await?;
        let previous = project.last_modified;

        let mut active: projects::ActiveModel = project.into();
        active.title = Set(title);
        let project = active
            .touch(previous)
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("rename project", e))?;

        self.announce(&project).await;
        Ok(project)
    }

    /// Bump `last_modified` to now, strictly past its previous value.
    pub async fn touch(&self, id: &str) -> CoreResult<projects::Model> {
        let project = self.get(id).await?;
        let previous = project.last_modified;

        let active: projects::ActiveModel = project.into();
        let project = active
            .touch(previous)
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("touch project", e))?;

        debug!("Touched project {}", project.id);
        self.announce(&project).await;
        Ok(project)
    }

    /// Delete a project and every message in it.
    pub async fn delete(&self, id: &str) -> CoreResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::database("begin project delete", e))?;

        let removed_messages = messages::Entity::delete_many()
            .filter(messages::Column::ProjectId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| CoreError::database("delete project messages", e))?
            .rows_affected;

        let result = projects::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await
            .map_err(|e| CoreError::database("delete project", e))?;

        if result.rows_affected == 0 {
            // dropping the transaction rolls it back
            return Err(CoreError::not_found("Project", id));
        }

        txn.commit()
            .await
            .map_err(|e| CoreError::database("commit project delete", e))?;

        info!(
            "Deleted project {} with {} messages",
            id, removed_messages
        );

        if let Some(feed) = &self.feed {
            feed.publish(id, ChangeKind::ProjectDeleted).await;
            feed.close(id).await;
        }
        Ok(())
    }

    async fn announce(&self, project: &projects::Model) {
        if let Some(feed) = &self.feed {
            feed.publish(
                &project.id,
                ChangeKind::ProjectUpdated {
                    title: project.title.clone(),
                    last_modified: project.last_modified,
                },
            )
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::errors::CoreErrorKind;

    #[tokio::test]
    async fn create_uses_default_title() {
        let service = ProjectService::new(setup_test_db().await);
        let project = service.create(None).await.unwrap();
        assert_eq!(project.title, "New Project");

        let named = service.create(Some("  Sketches ")).await.unwrap();
        assert_eq!(named.title, "Sketches");
    }

    #[tokio::test]
    async fn list_is_ordered_by_last_modified() {
        let service = ProjectService::new(setup_test_db().await);
        let first = service.create(Some("first")).await.unwrap();
        let second = service.create(Some("second")).await.unwrap();
        service.touch(&first.id).await.unwrap();

        let ids: Vec<String> = service.list().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn rename_validates_title() {
        let service = ProjectService::new(setup_test_db().await);
        let project = service.create(None).await.unwrap();

        let err = service.rename(&project.id, "   ").await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Validation);

        let renamed = service.rename(&project.id, "Moodboard").await.unwrap();
        assert_eq!(renamed.title, "Moodboard");
        assert!(renamed.last_modified > project.last_modified);
    }

    #[tokio::test]
    async fn rename_and_touch_strictly_advance_last_modified() {
        let service = ProjectService::new(setup_test_db().await);
        let project = service.create(None).await.unwrap();

        // pin the clock ahead so every later write lands in the same instant
        let ahead = chrono::Utc::now() + chrono::Duration::hours(1);
        let mut active: projects::ActiveModel = project.into();
        active.last_modified = Set(ahead);
        let project = active.update(&service.db).await.unwrap();

        let touched = service.touch(&project.id).await.unwrap();
        assert!(touched.last_modified > ahead);

        let renamed = service.rename(&project.id, "Later").await.unwrap();
        assert!(renamed.last_modified > touched.last_modified);

        let touched_again = service.touch(&project.id).await.unwrap();
        assert!(touched_again.last_modified > renamed.last_modified);
    }

    #[tokio::test]
    async fn delete_unknown_project_is_not_found() {
        let service = ProjectService::new(setup_test_db().await);
        let err = service.delete("missing").await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_publishes_event() {
        let feed = ChangeFeed::new();
        let service = ProjectService::new(setup_test_db().await).with_feed(feed.clone());
        let project = service.create(None).await.unwrap();

        let mut receiver = feed.subscribe(&project.id).await;
        service.delete(&project.id).await.unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::ProjectDeleted);
        assert!(service.get(&project.id).await.is_err());
    }
}
