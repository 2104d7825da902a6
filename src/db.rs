use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection,
    sqlx::sqlite::{SqliteJournalMode, SqliteSynchronous},
};

use crate::error::AppResult;

const CACHE_SIZE_KIB: &str = "-64000";

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let db = connect(database_url).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Opens the database without touching the schema. Pragmas are part of the
/// connect options so every pooled connection gets them.
pub async fn connect(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url);
    opts.map_sqlx_sqlite_opts(|o| {
        o.journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("cache_size", CACHE_SIZE_KIB)
    });
    Ok(Database::connect(opts).await?)
}

pub fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
mod tests {
    use sea_orm::{ConnectionTrait, Statement};

    use super::*;

    async fn pragma<T: sea_orm::TryGetable>(db: &DatabaseConnection, name: &str) -> T {
        let row = db
            .query_one(Statement::from_string(db.get_database_backend(), format!("PRAGMA {name}")))
            .await
            .unwrap()
            .unwrap();
        row.try_get_by_index(0).unwrap()
    }

    #[tokio::test]
    async fn file_database_gets_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("club.db").display());
        let db = connect_and_migrate(&url).await.unwrap();

        // repeated reads may land on different pooled connections
        for _ in 0..3 {
            assert_eq!(pragma::<String>(&db, "journal_mode").await.to_lowercase(), "wal");
            assert_eq!(pragma::<i64>(&db, "synchronous").await, 1);
            assert_eq!(pragma::<i64>(&db, "cache_size").await, -64000);
        }
    }
}
