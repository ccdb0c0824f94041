pub mod billing_service;
pub mod conversation_service;
pub mod generation;
pub mod message_store;
pub mod project_service;
pub mod validation;

pub use billing_service::BillingService;
pub use conversation_service::{ConversationService, SendMessage};
pub use message_store::{BatchOutcome, MessageStore, NewNode};
pub use project_service::ProjectService;
pub use validation::ValidationService;
