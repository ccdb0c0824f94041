//! Branching conversation canvas for AI image sessions.
//!
//! Conversations are stored per project as a forest of message nodes laid
//! out on a 2D canvas. See [`canvas`] for the pure model and algorithms,
//! [`services`] for persistence and generation, and [`AppContext`] for the
//! state a client works against.

pub mod app_context;
pub mod canvas;
pub mod common;
pub mod config;
pub mod database;
pub mod errors;
pub mod services;
pub mod sync;
pub mod utils;

pub use app_context::AppContext;
