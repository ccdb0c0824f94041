use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::canvas::{LayoutSpacing, Project, Session};
use crate::services::generation::ImageGenerator;
use crate::services::{
    BillingService, ConversationService, MessageStore, ProjectService,
};
use crate::sync::ChangeFeed;

mod canvas_operations;
mod project_operations;

/// Shared application state: services plus the locally held session.
///
/// Edits are applied to the session first and persisted afterwards. A
/// failed write is reported to the caller but not rolled back locally.
#[derive(Clone)]
pub struct AppContext {
    db: DatabaseConnection,
    project_service: ProjectService,
    message_store: MessageStore,
    billing_service: BillingService,
    conversation_service: ConversationService,
    feed: ChangeFeed,
    session: Arc<RwLock<Session>>,
    layout_spacing: LayoutSpacing,
    user_id: String,
}

impl AppContext {
    pub fn new(
        db: DatabaseConnection,
        generator: Arc<dyn ImageGenerator>,
        user_id: impl Into<String>,
    ) -> Self {
        Self::with_feed(db, generator, user_id, ChangeFeed::new())
    }

    /// Build a context publishing on an existing feed, e.g. a second client
    /// of the same workspace.
    pub fn with_feed(
        db: DatabaseConnection,
        generator: Arc<dyn ImageGenerator>,
        user_id: impl Into<String>,
        feed: ChangeFeed,
    ) -> Self {
        let user_id = user_id.into();
        let project_service = ProjectService::new(db.clone()).with_feed(feed.clone());
        let message_store = MessageStore::new(db.clone()).with_feed(feed.clone());
        let billing_service = BillingService::new(db.clone());
        let conversation_service = ConversationService::new(
            message_store.clone(),
            project_service.clone(),
            billing_service.clone(),
            generator,
            user_id.clone(),
        );

        Self {
            db,
            project_service,
            message_store,
            billing_service,
            conversation_service,
            feed,
            session: Arc::new(RwLock::new(Session::new())),
            layout_spacing: LayoutSpacing::default(),
            user_id,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn project_service(&self) -> &ProjectService {
        &self.project_service
    }

    pub fn message_store(&self) -> &MessageStore {
        &self.message_store
    }

    pub fn billing_service(&self) -> &BillingService {
        &self.billing_service
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn session(&self) -> Arc<RwLock<Session>> {
        Arc::clone(&self.session)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

// ----- Public types -----

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    pub last_modified: DateTime<Utc>,
    pub node_count: usize,
    pub loaded: bool,
    pub is_current: bool,
}

impl ProjectSummary {
    fn from_project(project: &Project, current: Option<&str>) -> Self {
        Self {
            id: project.id.clone(),
            title: project.title.clone(),
            last_modified: project.last_modified,
            node_count: project.forest.len(),
            loaded: project.loaded,
            is_current: current == Some(project.id.as_str()),
        }
    }
}
