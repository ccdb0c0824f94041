mod db;
mod temp;

pub use db::TestDb;
pub use temp::TempDir;
