use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use sea_orm::DbErr;

use super::{BillingError, CanvasError, GenerationError};
use crate::common::db_errors::{format_db_error, DbErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unavailable,
    Internal,
}

#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    message: String,
    fields: Option<BTreeMap<String, String>>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: None,
            source: None,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        let entity = entity.into();
        let id = id.into();
        let mut fields = BTreeMap::new();
        fields.insert("entity".to_string(), entity.clone());
        fields.insert("id".to_string(), id.clone());

        Self {
            kind: CoreErrorKind::NotFound,
            message: format!("{} '{}' not found", entity, id),
            fields: Some(fields),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    /// Categorise a database error raised while performing `operation`.
    pub fn database(operation: &str, err: DbErr) -> Self {
        let (db_kind, message) = format_db_error(operation, &err);
        let kind = match db_kind {
            DbErrorKind::NotFound => CoreErrorKind::NotFound,
            DbErrorKind::UniqueViolation => CoreErrorKind::Conflict,
            DbErrorKind::ForeignKeyViolation => CoreErrorKind::Validation,
            DbErrorKind::ConnectionError | DbErrorKind::Timeout => CoreErrorKind::Unavailable,
            DbErrorKind::Unknown => CoreErrorKind::Internal,
        };
        Self::new(kind, message).with_source(err)
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, String>> {
        self.fields.as_ref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<CanvasError> for CoreError {
    fn from(err: CanvasError) -> Self {
        let kind = if err.is_not_found() {
            CoreErrorKind::NotFound
        } else if matches!(err, CanvasError::NodeAlreadyExists(_)) {
            CoreErrorKind::Conflict
        } else {
            CoreErrorKind::Validation
        };
        let mut fields = BTreeMap::new();
        fields.insert("code".to_string(), err.error_code().to_string());
        CoreError::new(kind, err.to_string())
            .with_fields(fields)
            .with_source(err)
    }
}

impl From<GenerationError> for CoreError {
    fn from(err: GenerationError) -> Self {
        let kind = if err.is_client_error() {
            CoreErrorKind::Validation
        } else {
            CoreErrorKind::Unavailable
        };
        CoreError::new(kind, err.to_string()).with_source(err)
    }
}

impl From<BillingError> for CoreError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Database(db_err) => CoreError::database("update credit ledger", db_err),
            BillingError::ProfileNotFound(ref user) => {
                CoreError::not_found("Profile", user.clone()).with_source(err)
            }
            BillingError::InvalidAmount(_) => {
                CoreError::validation(err.to_string()).with_source(err)
            }
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        let boxed: Box<dyn StdError + Send + Sync> = err.into();
        Self {
            kind: CoreErrorKind::Internal,
            message: "Unhandled error".to_string(),
            fields: None,
            source: Some(boxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_fields() {
        let err = CoreError::not_found("Project", "p-1");
        assert_eq!(err.kind(), CoreErrorKind::NotFound);
        assert_eq!(err.message(), "Project 'p-1' not found");
        let fields = err.fields().unwrap();
        assert_eq!(fields.get("entity").map(String::as_str), Some("Project"));
        assert_eq!(fields.get("id").map(String::as_str), Some("p-1"));
    }

    #[test]
    fn test_canvas_error_conversion_keeps_source() {
        let err: CoreError = CanvasError::ParentNotFound {
            node: "n".to_string(),
            parent: "p".to_string(),
        }
        .into();
        assert_eq!(err.kind(), CoreErrorKind::Validation);
        assert!(err.source().is_some());
        assert_eq!(
            err.fields().and_then(|f| f.get("code")).map(String::as_str),
            Some("VALIDATION_FAILED")
        );
    }

    #[test]
    fn test_generation_error_conversion() {
        let err: CoreError = GenerationError::Transport("timed out".to_string()).into();
        assert_eq!(err.kind(), CoreErrorKind::Unavailable);
        assert!(err.to_string().starts_with("Unavailable: "));
    }

    #[test]
    fn test_database_error_conversion() {
        let err = CoreError::database(
            "load project",
            DbErr::RecordNotFound("projects".to_string()),
        );
        assert_eq!(err.kind(), CoreErrorKind::NotFound);
        assert_eq!(err.message(), "load project: record not found");
    }
}
