use branchcanvas_test_utils::TestDb;
use sea_orm::DatabaseConnection;

use crate::database::migrations::Migrator;

pub async fn setup_test_db() -> DatabaseConnection {
    TestDb::new_in_memory()
        .migrated::<Migrator>()
        .await
        .expect("Failed to set up migrated test database")
}
