pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_projects;
mod m20250101_000002_create_messages;
mod m20250101_000003_create_profiles;
mod m20250101_000004_create_credit_transactions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_projects::Migration),
            Box::new(m20250101_000002_create_messages::Migration),
            Box::new(m20250101_000003_create_profiles::Migration),
            Box::new(m20250101_000004_create_credit_transactions::Migration),
        ]
    }
}
