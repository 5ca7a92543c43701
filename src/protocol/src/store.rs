use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TARGET_SQL: &str = "SELECT 1 FROM scope \
    INNER JOIN modules ON scope.mid = modules.mid \
    WHERE scope.app_pkg_name = ?1 AND scope.user_id = ?2 AND modules.enabled = 1 \
    LIMIT 1";

/// Read-only view of the module configuration.
pub trait ScopeStore {
    /// Whether an enabled module has `app_name` in its scope for `user_id`.
    fn is_targeted(&self, app_name: &str, user_id: i32) -> Result<bool>;
}

impl ScopeStore for Connection {
    fn is_targeted(&self, app_name: &str, user_id: i32) -> Result<bool> {
        let mut stmt = self.prepare(TARGET_SQL)?;
        Ok(stmt.exists(params![app_name, user_id])?)
    }
}

/// The on-disk configuration database, opened fresh for every lookup.
pub struct SqliteScopeStore {
    path: PathBuf,
}

impl SqliteScopeStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().into(),
        }
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open {}", self.path.display()))?;

        conn.busy_timeout(Duration::from_millis(1_000))?;
        Ok(conn)
    }
}

impl ScopeStore for SqliteScopeStore {
    fn is_targeted(&self, app_name: &str, user_id: i32) -> Result<bool> {
        self.open()?.is_targeted(app_name, user_id)
    }
}
