pub mod credit_transactions;
pub mod messages;
pub mod profiles;
pub mod projects;
