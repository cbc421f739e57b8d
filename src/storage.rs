use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

/// Well-known keys shared between the pre-redirect and post-redirect halves
/// of a connect flow.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const REDIRECT_PATH: &str = "redirectPath";
}

/// Durable key/value handoff that survives the process exiting between
/// "open the provider" and "handle the callback".
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = match opts.path {
            Some(path) => path,
            None => default_path().context("storage: no data directory")?,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("storage: mkdir {}", dir.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: enable WAL")?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("storage: busy timeout")?;
        Self::from_connection(conn)
    }

    /// Process-local store, used by tests and one-shot commands.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(
            Connection::open_in_memory().context("storage: open in-memory database")?,
        )
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Flushes and closes the database; fails while other handles are alive.
    pub fn close(self) -> Result<()> {
        let Ok(conn) = Arc::try_unwrap(self.conn) else {
            bail!("storage: store is still shared");
        };
        conn.into_inner()
            .close()
            .map_err(|(_, err)| err)
            .context("storage: close")
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("storage: read {key}"))
    }

    /// Overwrites any previous value; there is no merge.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            bail!("storage: key required");
        }
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO kv (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![key, value, Utc::now().timestamp()],
        )
        .with_context(|| format!("storage: write {key}"))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .with_context(|| format!("storage: delete {key}"))?;
        Ok(removed > 0)
    }

    /// Reads and deletes in one transaction so a value is consumed at most once.
    pub fn take(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("storage: begin take")?;
        let value: Option<String> = tx
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("storage: read {key}"))?;
        if value.is_some() {
            tx.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .with_context(|| format!("storage: delete {key}"))?;
        }
        tx.commit().context("storage: commit take")?;
        Ok(value)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
SELECT key
FROM kv
WHERE substr(key, 1, length(?1)) = ?1
ORDER BY key ASC
"#,
        )?;
        let rows = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }
}

/// Applied in order; `PRAGMA user_version` records how many have run.
const MIGRATIONS: &[&str] = &[r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#];

fn migrate(conn: &Connection) -> Result<()> {
    let applied: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("storage: read schema version")?;
    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(applied.max(0) as usize) {
        let version = idx as i64 + 1;
        conn.execute_batch(sql)
            .with_context(|| format!("storage: apply migration {version}"))?;
        conn.pragma_update(None, "user_version", version)
            .with_context(|| format!("storage: record migration {version}"))?;
    }
    Ok(())
}

pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("social-connect").join("state.db"))
}
