//! Every project known to this client plus the current-project pointer.

use indexmap::IndexMap;

use super::{CanvasNode, Project};
use crate::errors::{CanvasError, CanvasResult};

#[derive(Debug, Clone, Default)]
pub struct Session {
    projects: IndexMap<String, Project>,
    current: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        let mut session = Self::new();
        for project in projects {
            session.projects.insert(project.id.clone(), project);
        }
        session
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Projects, most recently modified first.
    pub fn ordered(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.values().collect();
        projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        projects
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.get_mut(id)
    }

    pub fn upsert_project(&mut self, project: Project) {
        self.projects.insert(project.id.clone(), project);
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&Project> {
        self.current.as_deref().and_then(|id| self.projects.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut Project> {
        match self.current.as_deref() {
            Some(id) => self.projects.get_mut(id),
            None => None,
        }
    }

    pub fn select(&mut self, id: &str) -> CanvasResult<()> {
        if !self.projects.contains_key(id) {
            return Err(CanvasError::ProjectNotFound(id.to_string()));
        }
        self.current = Some(id.to_string());
        Ok(())
    }

    /// Select the most recently modified project, if any.
    pub fn select_newest(&mut self) -> Option<&str> {
        let newest = self.ordered().first().map(|p| p.id.clone());
        self.current = newest;
        self.current.as_deref()
    }

    /// Drop a project. When it was current, the newest remaining project
    /// becomes current.
    pub fn remove_project(&mut self, id: &str) -> Option<Project> {
        let removed = self.projects.shift_remove(id);
        if self.current.as_deref() == Some(id) {
            self.select_newest();
        }
        removed
    }

    /// Newest image of the current project, used as editing context.
    pub fn latest_image(&self) -> Option<&CanvasNode> {
        self.current().and_then(Project::latest_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::node::test_node;
    use crate::canvas::{Forest, NodeRole};
    use chrono::{Duration, Utc};

    fn project(id: &str, age_minutes: i64) -> Project {
        Project {
            id: id.to_string(),
            title: id.to_uppercase(),
            last_modified: Utc::now() - Duration::minutes(age_minutes),
            forest: Forest::new(),
            loaded: true,
        }
    }

    #[test]
    fn ordered_is_newest_first() {
        let session = Session::from_projects(vec![project("old", 30), project("new", 1)]);
        let ids: Vec<_> = session.ordered().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn removing_current_selects_next() {
        let mut session = Session::from_projects(vec![
            project("a", 1),
            project("b", 5),
            project("c", 10),
        ]);
        session.select("a").unwrap();
        session.remove_project("a");
        assert_eq!(session.current_id(), Some("b"));

        session.remove_project("c");
        assert_eq!(session.current_id(), Some("b"));

        session.remove_project("b");
        assert_eq!(session.current_id(), None);
    }

    #[test]
    fn select_unknown_project_fails() {
        let mut session = Session::new();
        assert_eq!(
            session.select("nope").unwrap_err(),
            CanvasError::ProjectNotFound("nope".to_string())
        );
    }

    #[test]
    fn latest_image_comes_from_current_project() {
        let mut with_image = project("img", 1);
        let mut node = test_node("n", None, NodeRole::Model, 0.0, 0.0);
        node.image_url = Some("data:image/png;base64,QQ==".to_string());
        with_image.forest.insert(node).unwrap();

        let mut session = Session::from_projects(vec![with_image, project("plain", 2)]);
        session.select("plain").unwrap();
        assert!(session.latest_image().is_none());

        session.select("img").unwrap();
        assert_eq!(session.latest_image().map(|n| n.id.as_str()), Some("n"));
    }
}
