pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_club_tables;
mod m20250108_000001_create_tierlists;
mod m20250110_000001_create_tmdb_cache;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_club_tables::Migration),
            Box::new(m20250108_000001_create_tierlists::Migration),
            Box::new(m20250110_000001_create_tmdb_cache::Migration),
        ]
    }
}
