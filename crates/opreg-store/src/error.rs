use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: i64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("no migration path from version {from} to {to}")]
    NoMigrationPath { from: i64, to: i64 },

    #[error("migration subset {0:?} is not contiguous with the current schema version")]
    NonContiguousSubset(Vec<i64>),

    #[error("database is newer (version {found}) than this binary supports (version {max})")]
    SchemaTooNew { found: i64, max: i64 },

    #[error(transparent)]
    Model(#[from] opreg_model::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
