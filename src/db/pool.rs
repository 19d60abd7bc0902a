//! SQLite connection pooling with r2d2.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;

use super::migrations;
use crate::{Error, Result};

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Open (or create) the database file at `db_path` and run pending migrations.
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::Database(format!("Failed to create connection pool: {}", e)))?;

    migrate(&pool)?;
    Ok(pool)
}

/// In-memory pool for tests.
///
/// Every SQLite in-memory connection is its own database, so the pool holds
/// exactly one connection.
pub fn init_memory_pool() -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(1)
        .build(SqliteConnectionManager::memory())
        .map_err(|e| Error::Database(format!("Failed to create in-memory pool: {}", e)))?;

    migrate(&pool)?;
    Ok(pool)
}

pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    Ok(pool.get()?)
}

fn migrate(pool: &DbPool) -> Result<()> {
    let conn = get_conn(pool)?;
    migrations::run_migrations(&conn)
        .map_err(|e| Error::Database(format!("Failed to run migrations: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_memory_pool_runs_migrations() {
        let pool = init_memory_pool().unwrap();
        assert_eq!(pool.max_size(), 1);

        let conn = get_conn(&pool).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='processed_images'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_file_pool_persists_between_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gallery.sqlite");
        let path = path.to_string_lossy().to_string();

        {
            let pool = init_pool(&path).unwrap();
            let conn = get_conn(&pool).unwrap();
            conn.execute(
                "INSERT INTO orphaned_blobs (blob_path, last_error, recorded_at) VALUES (?, ?, ?)",
                rusqlite::params!["originals/a.jpg", "boom", "2024-01-01T00:00:00Z"],
            )
            .unwrap();
        }

        let pool = init_pool(&path).unwrap();
        let conn = get_conn(&pool).unwrap();
        let attempts: i64 = conn
            .query_row(
                "SELECT attempts FROM orphaned_blobs WHERE blob_path = ?",
                ["originals/a.jpg"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(attempts, 1);
    }
}
