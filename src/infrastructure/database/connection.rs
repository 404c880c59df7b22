use anyhow::{Result, anyhow};
use r2d2::{Pool, PooledConnection};
use rusqlite::Connection;
use std::path::PathBuf;

/// r2d2 manager for rusqlite connections. Every checked-out connection has
/// foreign keys and WAL mode enabled so cascade deletes and concurrent
/// readers behave.
pub struct SqliteConnectionManager {
    path: Option<PathBuf>,
}

impl SqliteConnectionManager {
    pub fn file(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn memory() -> Self {
        Self { path: None }
    }
}

impl r2d2::ManageConnection for SqliteConnectionManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> std::result::Result<Connection, rusqlite::Error> {
        let conn = match &self.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        // journal_mode returns a row, so execute_batch rather than execute
        conn.execute_batch("PRAGMA foreign_keys=ON")?;
        if self.path.is_some() {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL")?;
        }
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Connection) -> bool {
        false
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (and initialize) the registry database. `None` uses an in-memory
    /// database, which is what tests run against.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let manager = match db_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                SqliteConnectionManager::file(path)
            }
            // One shared in-memory db per pool would need shared-cache URIs;
            // a single connection keeps test state coherent instead.
            None => SqliteConnectionManager::memory(),
        };

        let max_size = if manager.path.is_some() { 8 } else { 1 };
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| anyhow!("Failed to build sqlite pool: {e}"))?;

        let db = Self { pool };
        super::db_schema::initialize_schema(&db)?;
        Ok(db)
    }

    pub fn get_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow!("Failed to get database connection: {e}"))
    }
}
