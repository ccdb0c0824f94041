use tracing::{debug, info};

use super::{AppContext, ProjectSummary};
use crate::canvas::{Project, Session};
use crate::errors::{CoreError, CoreErrorKind, CoreResult};
use crate::sync::ProjectSync;

impl AppContext {
    // ----- Session lifecycle -----------------------------------------------

    /// Load every project and pick the current one.
    ///
    /// `preferred` is selected when it exists, otherwise the most recently
    /// modified project. A first project is created when there are none.
    pub async fn bootstrap(&self, preferred: Option<&str>) -> CoreResult<ProjectSummary> {
        let mut rows = self.project_service.list().await?;
        if rows.is_empty() {
            info!("No projects yet, creating the first one");
            rows.push(self.project_service.create(None).await?);
        }

        let mut session = Session::from_projects(rows.into_iter().map(Project::from));
        match preferred.filter(|id| session.project(id).is_some()) {
            Some(id) => session.select(id)?,
            None => {
                session.select_newest();
            }
        }
        let current = session
            .current_id()
            .map(str::to_string)
            .ok_or_else(|| CoreError::internal("Session has no current project"))?;

        *self.session.write().await = session;
        self.ensure_loaded(&current).await?;
        self.project_summary(&current).await
    }

    pub async fn list_projects(&self) -> Vec<ProjectSummary> {
        let session = self.session.read().await;
        session
            .ordered()
            .into_iter()
            .map(|p| ProjectSummary::from_project(p, session.current_id()))
            .collect()
    }

    pub async fn project_summary(&self, id: &str) -> CoreResult<ProjectSummary> {
        let session = self.session.read().await;
        session
            .project(id)
            .map(|p| ProjectSummary::from_project(p, session.current_id()))
            .ok_or_else(|| CoreError::not_found("Project", id))
    }

    pub async fn current_project_id(&self) -> Option<String> {
        self.session.read().await.current_id().map(str::to_string)
    }

    // ----- Project CRUD ----------------------------------------------------

    /// Create a project and make it current.
    pub async fn create_project(&self, title: Option<&str>) -> CoreResult<ProjectSummary> {
        let row = self.project_service.create(title).await?;
        let id = row.id.clone();

        let mut project = Project::from(row);
        project.loaded = true;
        {
            let mut session = self.session.write().await;
            session.upsert_project(project);
            session.select(&id)?;
        }
        self.project_summary(&id).await
    }

    pub async fn select_project(&self, id: &str) -> CoreResult<ProjectSummary> {
        self.ensure_known(id).await?;
        self.session.write().await.select(id)?;
        self.ensure_loaded(id).await?;
        self.project_summary(id).await
    }

    pub async fn rename_project(&self, id: &str, title: &str) -> CoreResult<ProjectSummary> {
        self.ensure_known(id).await?;
        let row = self.project_service.rename(id, title).await?;
        {
            let mut session = self.session.write().await;
            if let Some(project) = session.project_mut(id) {
                project.title = row.title;
                project.touch(row.last_modified);
            }
        }
        self.project_summary(id).await
    }

    /// Delete a project with its nodes.
    ///
    /// When the current project goes away the next most recent one becomes
    /// current, or a fresh project is created if none remain.
    pub async fn delete_project(&self, id: &str) -> CoreResult<Option<String>> {
        self.ensure_known(id).await?;
        let removed = self.session.write().await.remove_project(id);

        let result = self.project_service.delete(id).await;
        if let Err(err) = result {
            // a project missing in storage is gone either way
            if removed.is_none() || err.kind() != CoreErrorKind::NotFound {
                return Err(err);
            }
        }

        let needs_fresh = self.session.read().await.is_empty();
        if needs_fresh {
            let created = self.create_project(None).await?;
            return Ok(Some(created.id));
        }

        let current = self.current_project_id().await;
        if let Some(current) = &current {
            self.ensure_loaded(current).await?;
        }
        Ok(current)
    }

    // ----- Loading and sync ------------------------------------------------

    /// Load the forest of `id` from storage if it is not loaded yet.
    pub async fn ensure_loaded(&self, id: &str) -> CoreResult<()> {
        let loaded = self
            .session
            .read()
            .await
            .project(id)
            .map(|p| p.loaded)
            .ok_or_else(|| CoreError::not_found("Project", id))?;
        if loaded {
            return Ok(());
        }

        let forest = self.message_store.load_forest(id).await?;
        debug!("Loaded {} nodes for project {}", forest.len(), id);

        let mut session = self.session.write().await;
        if let Some(project) = session.project_mut(id) {
            project.forest = forest;
            project.loaded = true;
        }
        Ok(())
    }

    /// Follow changes made to `id` by other writers.
    pub async fn start_sync(&self, id: &str) -> CoreResult<ProjectSync> {
        self.ensure_known(id).await?;
        let receiver = self.feed.subscribe(id).await;
        Ok(ProjectSync::spawn(
            id,
            self.feed.origin(),
            receiver,
            self.session(),
        ))
    }

    async fn ensure_known(&self, id: &str) -> CoreResult<()> {
        if self.session.read().await.project(id).is_some() {
            return Ok(());
        }
        // created elsewhere since bootstrap
        let row = self.project_service.get(id).await?;
        self.session.write().await.upsert_project(Project::from(row));
        Ok(())
    }
}
