use crate::error::Result;
use crate::migrator::Migrator;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;

/// The embedded store: one writer connection guarded by a mutex, plus a
/// path so readers can open their own read-only connection against the
/// same file (`spec.md` §5 — readers never block on the writer, or on
/// each other).
///
/// A single-writer `Mutex<Connection>` is a simplification of the pack's
/// connection-pool approach (`r2d2` et al.); it's the right trade here
/// because writes only ever happen during a load, never concurrently
/// with each other, and SQLite itself serializes writers regardless.
pub struct Store {
    path: StorePath,
    writer: Mutex<Connection>,
}

#[derive(Clone)]
enum StorePath {
    Memory,
    File(std::path::PathBuf),
}

/// A caller recovers from a panic mid-transaction via `catch_unwind`
/// (`spec.md` §9); the writer mutex should not stay poisoned afterward,
/// since SQLite's own transaction rollback already restored the
/// database to a consistent state.
fn lock_writer(writer: &Mutex<Connection>) -> std::sync::MutexGuard<'_, Connection> {
    writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Store {
    /// Creates a new, empty store at `path` and runs every migration
    /// against it. Truncates any existing file, mirroring how a fresh
    /// catalog build replaces its predecessor wholesale.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path != Path::new(":memory:") {
            std::fs::write(path, []).map_err(rusqlite::Error::from)?;
        }
        let store = Self::open_unchecked(path)?;
        {
            let mut conn = lock_writer(&store.writer);
            Migrator::new().up(&mut conn)?;
        }
        Ok(store)
    }

    /// Opens an existing store and applies any migrations newer than its
    /// on-disk version. Fails if the file is stamped with a version this
    /// binary doesn't understand.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::open_unchecked(path)?;
        {
            let mut conn = lock_writer(&store.writer);
            Migrator::new().up(&mut conn)?;
        }
        Ok(store)
    }

    fn open_unchecked(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()?
        } else {
            let c = Connection::open(path)?;
            c.pragma_update(None, "journal_mode", "WAL")?;
            c
        };
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store_path = if path == Path::new(":memory:") {
            StorePath::Memory
        } else {
            StorePath::File(path.to_path_buf())
        };
        Ok(Self { path: store_path, writer: Mutex::new(conn) })
    }

    /// Runs `f` against the single writer connection. Generic over `f`'s
    /// error type rather than fixed to `StoreError`, since the store
    /// itself has nothing to report here — callers such as the loader
    /// wrap a whole load in one transaction and want their own error
    /// type to come back out untouched.
    pub fn with_writer<T, E>(&self, f: impl FnOnce(&mut Connection) -> std::result::Result<T, E>) -> std::result::Result<T, E> {
        let mut conn = lock_writer(&self.writer);
        f(&mut conn)
    }

    /// Opens a fresh read-only connection against the same database file,
    /// for a querier to use without contending with the writer. Against
    /// an in-memory store this instead clones the writer's handle, since
    /// `:memory:` databases aren't file-backed and can't be reopened.
    pub fn read_connection(&self) -> Result<Connection> {
        match &self.path {
            StorePath::Memory => {
                let writer = lock_writer(&self.writer);
                let fresh = Connection::open_in_memory()?;
                writer.backup(rusqlite::DatabaseName::Main, &fresh, rusqlite::DatabaseName::Main, None)?;
                Ok(fresh)
            }
            StorePath::File(path) => {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                Ok(conn)
            }
        }
    }

    pub fn schema_version(&self) -> Result<i64> {
        let conn = lock_writer(&self.writer);
        Migrator::new().current_version(&conn)
    }

    /// Applies every migration newer than the current schema version.
    /// `open`/`create` already do this, so this is mostly useful for a
    /// CLI command that wants to report the outcome explicitly rather
    /// than as a side effect of opening.
    pub fn migrate_up(&self) -> Result<()> {
        let mut conn = lock_writer(&self.writer);
        Migrator::new().up(&mut conn)
    }

    /// Reverses every migration down to an empty schema.
    pub fn migrate_down(&self) -> Result<()> {
        let mut conn = lock_writer(&self.writer);
        Migrator::new().down(&mut conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_runs_every_migration() {
        let store = Store::create(":memory:").unwrap();
        assert_eq!(store.schema_version().unwrap(), crate::schema::LATEST_VERSION);
    }

    #[test]
    fn open_on_disk_round_trips_schema_version() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let store = Store::create(tmp.path()).unwrap();
            assert_eq!(store.schema_version().unwrap(), crate::schema::LATEST_VERSION);
        }
        let reopened = Store::open(tmp.path()).unwrap();
        assert_eq!(reopened.schema_version().unwrap(), crate::schema::LATEST_VERSION);
    }

    #[test]
    fn read_connection_sees_writer_committed_rows() {
        let store = Store::create(":memory:").unwrap();
        store
            .with_writer(|conn| {
                conn.execute("INSERT INTO package (name, default_channel) VALUES ('etcd', 'alpha')", [])?;
                Ok(())
            })
            .unwrap();
        let reader = store.read_connection().unwrap();
        let name: String = reader.query_row("SELECT name FROM package WHERE name = 'etcd'", [], |r| r.get(0)).unwrap();
        assert_eq!(name, "etcd");
    }
}
