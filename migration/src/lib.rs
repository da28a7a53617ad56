pub use sea_orm_migration::prelude::*;

mod m20260801_000001_create_characters;
mod m20260801_000002_create_mint_orders;
mod m20260801_000003_create_mint_verify_jobs;
mod m20260801_000004_create_mint_webhook_replays;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260801_000001_create_characters::Migration),
            Box::new(m20260801_000002_create_mint_orders::Migration),
            Box::new(m20260801_000003_create_mint_verify_jobs::Migration),
            Box::new(m20260801_000004_create_mint_webhook_replays::Migration),
        ]
    }
}
