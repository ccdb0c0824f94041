//! Canvas forest error types
//!
//! Structural violations are rejected at write time so that the layout
//! recursion can assume an acyclic forest.
//!
//! # Examples
//!
//! ```rust
//! use branchcanvas::errors::CanvasError;
//!
//! let err = CanvasError::ParentNotFound {
//!     node: "n2".to_string(),
//!     parent: "gone".to_string(),
//! };
//! assert_eq!(err.error_code(), "VALIDATION_FAILED");
//! ```

use thiserror::Error;

/// Errors raised by the message forest and its store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanvasError {
    /// Project not found by ID
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    /// Node not found in the project
    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    /// Parent reference does not resolve inside the project
    #[error("Parent '{parent}' of node '{node}' does not exist in this project")]
    ParentNotFound {
        /// Node being written
        node: String,
        /// Unresolved parent identifier
        parent: String,
    },

    /// Writing the node would make it its own ancestor
    #[error("Node '{node}' cannot be attached to '{parent}': ancestry would cycle")]
    CyclicAncestry {
        /// Node being written
        node: String,
        /// Requested parent identifier
        parent: String,
    },

    /// Node ID already present in the project
    #[error("Node '{0}' already exists")]
    NodeAlreadyExists(String),

    /// Nothing usable to regenerate from
    #[error("Node '{0}' has no prompt to regenerate")]
    NothingToRegenerate(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CanvasError {
    /// Check if this is a client error (400-series)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CanvasError::ParentNotFound { .. }
                | CanvasError::CyclicAncestry { .. }
                | CanvasError::NodeAlreadyExists(_)
                | CanvasError::NothingToRegenerate(_)
                | CanvasError::Validation(_)
        )
    }

    /// Check if this is a not found error (404)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CanvasError::ProjectNotFound(_) | CanvasError::NodeNotFound(_)
        )
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            CanvasError::ProjectNotFound(_) | CanvasError::NodeNotFound(_) => "NOT_FOUND",
            CanvasError::ParentNotFound { .. }
            | CanvasError::NothingToRegenerate(_)
            | CanvasError::Validation(_) => "VALIDATION_FAILED",
            CanvasError::CyclicAncestry { .. } => "CYCLE_DETECTED",
            CanvasError::NodeAlreadyExists(_) => "CONFLICT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_not_found() {
        let err = CanvasError::NodeNotFound("n1".to_string());
        assert_eq!(err.to_string(), "Node 'n1' not found");
        assert!(err.is_not_found());
        assert!(!err.is_client_error());
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_cyclic_ancestry() {
        let err = CanvasError::CyclicAncestry {
            node: "a".to_string(),
            parent: "c".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Node 'a' cannot be attached to 'c': ancestry would cycle"
        );
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "CYCLE_DETECTED");
    }

    #[test]
    fn test_parent_not_found() {
        let err = CanvasError::ParentNotFound {
            node: "n2".to_string(),
            parent: "missing".to_string(),
        };
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }
}
