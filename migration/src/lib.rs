//! Database migrations for the Pipeline Gate service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_01_10_000001_create_companies;
mod m2025_01_10_000002_create_tokens;
mod m2025_01_10_000003_create_payments;
mod m2025_01_10_000004_create_validation_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_10_000001_create_companies::Migration),
            Box::new(m2025_01_10_000002_create_tokens::Migration),
            Box::new(m2025_01_10_000003_create_payments::Migration),
            Box::new(m2025_01_10_000004_create_validation_logs::Migration),
        ]
    }
}
