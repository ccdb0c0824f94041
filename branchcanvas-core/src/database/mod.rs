pub mod connection;
pub mod entities;
pub mod migrate;
pub mod migrations;

#[cfg(test)]
pub mod test_utils;

pub use connection::{establish_connection, get_database_url};
pub use migrate::{migrate_database, MigrateDirection};
