//! Domain-specific error types for branchcanvas
//!
//! Each area of the crate has its own structured error enum, and services
//! surface failures through [`CoreError`], which carries a coarse
//! [`CoreErrorKind`] plus the originating error as its source.
//!
//! # Error Categories
//!
//! - **CanvasError**: structural violations of the message forest (missing
//!   parents, cyclic ancestry, unknown nodes and projects)
//! - **GenerationError**: failures reported by the image-generation service
//! - **BillingError**: credit ledger failures
//!
//! # Examples
//!
//! ```rust
//! use branchcanvas::errors::{CanvasError, CoreError, CoreErrorKind};
//!
//! let err = CanvasError::CyclicAncestry {
//!     node: "a".to_string(),
//!     parent: "b".to_string(),
//! };
//! assert!(err.is_client_error());
//!
//! let core: CoreError = err.into();
//! assert_eq!(core.kind(), CoreErrorKind::Validation);
//! ```

pub mod billing;
pub mod canvas;
pub mod core_error;
pub mod generation;

pub use billing::BillingError;
pub use canvas::CanvasError;
pub use core_error::{CoreError, CoreErrorKind};
pub use generation::GenerationError;

/// Result type alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for pure forest operations
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Result type alias for generation calls
pub type GenerationResult<T> = Result<T, GenerationError>;
