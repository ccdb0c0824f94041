//! Cross-cutting helpers shared by services and the CLI.

pub mod db_errors;
