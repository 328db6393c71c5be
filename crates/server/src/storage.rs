use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, types::Value as SqlValue};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use watcharr_api::db::{self, migrations::MIGRATIONS, users::Built};
use watcharr_api::service::{AccountStore, StoreError, StoredUser};
use watcharr_api::EncodedCredential;

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("database mutex poisoned".into()))
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let db_path = data_dir.join("watcharr.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // Enable WAL mode for concurrent reads
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .with_context(|| format!("checking migration {name}"))?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ── sea-query execution helpers ────────────────────────────────────────────

fn bind_values(values: &sea_query::Values) -> Vec<SqlValue> {
    use sea_query::Value;
    values
        .0
        .iter()
        .map(|v| match v {
            Value::String(Some(s)) => SqlValue::Text(s.to_string()),
            Value::BigInt(Some(n)) => SqlValue::Integer(*n),
            Value::Int(Some(n)) => SqlValue::Integer(i64::from(*n)),
            _ => SqlValue::Null,
        })
        .collect()
}

pub fn sq_execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, rusqlite::params_from_iter(bind_values(&values)))
}

pub fn sq_query_row<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    conn.query_row(&sql, rusqlite::params_from_iter(bind_values(&values)), f)
}

// ── Account store ──────────────────────────────────────────────────────────

impl AccountStore for Db {
    fn insert_user(&self, username: &str, password: &EncodedCredential) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        match sq_execute(&conn, db::users::insert(username, password.as_str())) {
            Ok(_) => u64::try_from(conn.last_insert_rowid())
                .map_err(|e| StoreError::Backend(e.to_string())),
            Err(e) => Err(insert_error(e)),
        }
    }

    fn find_user(&self, username: &str) -> Result<Option<StoredUser>, StoreError> {
        let conn = self.conn()?;
        sq_query_row(&conn, db::users::get_by_username(username), |row| {
            let id: i64 = row.get(0)?;
            Ok(StoredUser {
                id: u64::try_from(id)
                    .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, id))?,
                username: row.get(1)?,
                password: EncodedCredential::from(row.get::<_, String>(2)?),
            })
        })
        .optional()
        .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

/// Only the UNIQUE index on `username` means the name is taken; NOT NULL and
/// other constraint failures stay backend errors.
fn insert_error(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::UsernameTaken
        }
        e => StoreError::Backend(e.to_string()),
    }
}
