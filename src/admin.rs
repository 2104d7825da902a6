//! One-shot maintenance commands run from the command line.

use std::path::Path;

use anyhow::Context;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Statement};
use sea_orm_migration::MigrationName;
use serde::Serialize;
use tracing::info;

use crate::{
    db::now_sec,
    entities::{
        movie, movies_on_shortlist, movies_on_tier, shortlist, site_config, tier, tierlist, user,
    },
};

const MIGRATIONS_TABLE: &str = "seaql_migrations";

/// Writes every club table to `<out>/<table>.json`. Returns `(table, rows)`
/// for each file written.
pub async fn export(db: &DatabaseConnection, out: &Path) -> anyhow::Result<Vec<(String, usize)>> {
    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("creating {}", out.display()))?;

    let written = vec![
        dump::<user::Entity>(db, out, "users").await?,
        dump::<movie::Entity>(db, out, "movies").await?,
        dump::<shortlist::Entity>(db, out, "shortlists").await?,
        dump::<movies_on_shortlist::Entity>(db, out, "movies_on_shortlists").await?,
        dump::<tierlist::Entity>(db, out, "tierlists").await?,
        dump::<tier::Entity>(db, out, "tiers").await?,
        dump::<movies_on_tier::Entity>(db, out, "movies_on_tiers").await?,
        dump::<site_config::Entity>(db, out, "site_config").await?,
    ];
    Ok(written)
}

async fn dump<E>(db: &DatabaseConnection, out: &Path, table: &str) -> anyhow::Result<(String, usize)>
where
    E: EntityTrait,
    E::Model: Serialize,
{
    let rows = E::find().all(db).await.with_context(|| format!("reading {table}"))?;
    let json = serde_json::to_vec_pretty(&rows)?;

    let path = out.join(format!("{table}.json"));
    tokio::fs::write(&path, json).await.with_context(|| format!("writing {}", path.display()))?;

    info!(table, rows = rows.len(), path = %path.display(), "exported");
    Ok((table.to_string(), rows.len()))
}

/// Records every known migration as applied without running it, for
/// databases whose schema was created outside the migrator. Returns the
/// names that were newly stamped.
pub async fn stamp_migrations(db: &DatabaseConnection) -> anyhow::Result<Vec<String>> {
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} \
             (version varchar NOT NULL PRIMARY KEY, applied_at bigint NOT NULL)"
        ),
    ))
    .await
    .context("creating migration table")?;

    let now = now_sec();
    let mut stamped = Vec::new();
    for migration in Migrator::migrations() {
        let name = migration.name().to_string();
        let result = db
            .execute(Statement::from_sql_and_values(
                backend,
                format!("INSERT OR IGNORE INTO {MIGRATIONS_TABLE} (version, applied_at) VALUES (?, ?)"),
                [name.clone().into(), now.into()],
            ))
            .await
            .with_context(|| format!("stamping {name}"))?;

        if result.rows_affected() > 0 {
            info!(migration = %name, "stamped");
            stamped.push(name);
        }
    }
    Ok(stamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, testing};

    #[tokio::test]
    async fn export_writes_one_file_per_table() {
        let db = testing::db().await;
        let ada = testing::user(&db, "Ada").await;
        testing::watched_movie(&db, 11, ada.id, "2024-05-01").await;
        testing::movie(&db, 12).await;

        let dir = tempfile::tempdir().unwrap();
        let written = export(&db, dir.path()).await.unwrap();
        assert_eq!(written.len(), 8);

        let movies: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(dir.path().join("movies.json")).unwrap()).unwrap();
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0]["id"], 11);
        assert_eq!(movies[0]["watch_date"], "2024-05-01");

        let shortlists: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(dir.path().join("shortlists.json")).unwrap())
                .unwrap();
        assert_eq!(shortlists.len(), 1);

        let raw = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
        assert!(raw.contains("\n  "), "output is pretty printed");
    }

    #[tokio::test]
    async fn stamping_marks_everything_applied_once() {
        let db = db::connect("sqlite::memory:").await.unwrap();

        let first = stamp_migrations(&db).await.unwrap();
        assert_eq!(first.len(), Migrator::migrations().len());
        assert!(Migrator::get_pending_migrations(&db).await.unwrap().is_empty());

        let second = stamp_migrations(&db).await.unwrap();
        assert!(second.is_empty());
    }
}
