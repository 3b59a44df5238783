use anyhow::Context;
use opreg_loader::load_directory;
use opreg_manifest::parse_directory;
use opreg_model::UpdateMode;
use opreg_store::Store;
use std::path::PathBuf;

/// Configuration for one directory-to-store load, shaped after
/// `{dbPath, migrationsPath?, permissive, updateMode}`.
#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// Directory containing operator bundle and package manifests.
    #[clap(long, env = "OPREG_MANIFEST_DIR")]
    manifest_dir: PathBuf,

    /// Path to the SQLite database file to create or update. Created
    /// fresh if it doesn't already exist.
    #[clap(long, env = "OPREG_DB_PATH")]
    db_path: PathBuf,

    /// Keep whatever loaded successfully instead of rolling the whole
    /// load back on the first error.
    #[clap(long)]
    permissive: bool,

    /// How a new bundle is stitched into an existing package's channel graph.
    #[clap(long, value_enum, default_value_t = UpdateModeArg::Replaces)]
    update_mode: UpdateModeArg,

    /// Accepted for configuration-shape parity with external migration
    /// tooling; this store's migrations are compiled in, not file-based,
    /// so a path here has no effect on the load.
    #[clap(long, env = "OPREG_MIGRATIONS_PATH")]
    migrations_path: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
#[clap(rename_all = "kebab-case")]
enum UpdateModeArg {
    Replaces,
    SemVer,
    SkipPatch,
}

impl From<UpdateModeArg> for UpdateMode {
    fn from(mode: UpdateModeArg) -> Self {
        match mode {
            UpdateModeArg::Replaces => UpdateMode::Replaces,
            UpdateModeArg::SemVer => UpdateMode::SemVer,
            UpdateModeArg::SkipPatch => UpdateMode::SkipPatch,
        }
    }
}

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let BuildArgs { manifest_dir, db_path, permissive, update_mode, migrations_path } = args;
    if migrations_path.is_some() {
        tracing::warn!(
            "--migrations-path was given but has no effect: this store's migrations are compiled in, not read from a directory"
        );
    }

    let parsed = parse_directory(&manifest_dir);
    tracing::info!(
        bundles = parsed.bundles.len(),
        packages = parsed.package_manifests.len(),
        warnings = parsed.warnings.len(),
        "parsed manifest directory"
    );

    let store = if db_path.exists() { Store::open(&db_path) } else { Store::create(&db_path) }
        .with_context(|| format!("opening store at {}", db_path.display()))?;

    let errors = load_directory(&store, &parsed, update_mode.into(), permissive).context("loading manifest directory")?;

    for (csv, err) in &errors.errors {
        tracing::warn!(%csv, %err, "bundle failed to load");
    }
    if !permissive && !errors.is_empty() {
        return errors.into_first_result().context("loading manifest directory");
    }

    tracing::info!(schema_version = store.schema_version()?, failed_bundles = errors.errors.len(), "catalog build complete");
    Ok(())
}
