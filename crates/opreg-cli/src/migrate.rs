use anyhow::Context;
use opreg_store::Store;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct MigrateArgs {
    /// Path to the SQLite database file to migrate.
    #[clap(long, env = "OPREG_DB_PATH")]
    db_path: PathBuf,

    #[clap(subcommand)]
    direction: Direction,
}

#[derive(clap::Subcommand, Debug)]
enum Direction {
    /// Apply every migration newer than the store's current schema version.
    Up,
    /// Reverse every migration down to an empty schema.
    Down,
}

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let MigrateArgs { db_path, direction } = args;
    let store = if db_path.exists() { Store::open(&db_path) } else { Store::create(&db_path) }
        .with_context(|| format!("opening store at {}", db_path.display()))?;

    match direction {
        Direction::Up => store.migrate_up().context("applying migrations")?,
        Direction::Down => store.migrate_down().context("reverting migrations")?,
    }

    tracing::info!(schema_version = store.schema_version()?, "migration complete");
    Ok(())
}
