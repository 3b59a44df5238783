//! Mutating catalog operations: bundle ingest, upgrade-graph
//! construction, deprecation, and removal (`spec.md` §4.4, §4.7).

mod deprecate;
mod directory;
mod graph;
mod package;
mod remove;
mod rows;
mod semver_mode;

pub use directory::load_directory;

use opreg_model::{Bundle, Error, LoadErrors, PackageManifest, PackageName, Result, UpdateMode, Version, CsvName};
use opreg_store::Store;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The mutating half of the catalog: every method here runs inside its
/// own transaction against the store's single writer connection. A
/// panic partway through is caught and surfaces as `Error::Generic`,
/// rolling the transaction back rather than poisoning the writer mutex —
/// the role `catch_unwind` plays in place of the source's panic-based
/// error capture (`spec.md` §9).
pub struct Loader<'s> {
    store: &'s Store,
    mode: UpdateMode,
}

impl<'s> Loader<'s> {
    pub fn new(store: &'s Store, mode: UpdateMode) -> Self {
        Self { store, mode }
    }

    /// `AddOperatorBundle`: writes the bundle's own row and its derived
    /// facts, without touching any channel graph.
    pub fn add_operator_bundle(&self, bundle: &Bundle) -> Result<()> {
        self.run(|conn| rows::upsert_operator_bundle_row(conn, bundle))
    }

    /// `AddPackageChannels`: wires already-inserted `bundles` into the
    /// channels `manifest` declares.
    pub fn add_package_channels(&self, manifest: &PackageManifest, bundles: &[Bundle]) -> Result<LoadErrors> {
        self.run(|conn| package::add_package_channels(conn, manifest, bundles, self.mode).map_err(|e| Error::TransactionFailure(e.to_string())))
    }

    /// `AddBundlePackageChannels`: the typical single-bundle ingest
    /// entry point — inserts the bundle, then re-wires the package's
    /// channel graph against the full bundle set now on hand.
    pub fn add_bundle_package_channels(
        &self,
        bundle: &Bundle,
        manifest: &PackageManifest,
        package_bundles: &[Bundle],
    ) -> LoadErrors {
        let result = catch_unwind(AssertUnwindSafe(|| -> Result<LoadErrors> {
            self.add_operator_bundle(bundle)?;
            self.add_package_channels(manifest, package_bundles)
        }));

        match result {
            Ok(Ok(errors)) => errors,
            Ok(Err(err)) => {
                let mut errors = LoadErrors::new();
                errors.push(bundle.csv_name.clone(), err);
                errors
            }
            Err(panic) => {
                let mut errors = LoadErrors::new();
                errors.push(bundle.csv_name.clone(), Error::Generic(panic_message(panic)));
                errors
            }
        }
    }

    pub fn deprecate_bundle(&self, csv: &CsvName) -> Result<()> {
        self.run(|conn| deprecate::deprecate_bundle(conn, csv))
    }

    pub fn remove_package(&self, package: &PackageName) -> Result<()> {
        self.run(|conn| remove::remove_package(conn, package))
    }

    pub fn remove_bundle_by_version(&self, package: &PackageName, version: &Version) -> Result<()> {
        self.run(|conn| remove::remove_bundle_by_version(conn, package, version))
    }

    pub fn remove_stranded_bundles(&self) -> Result<usize> {
        self.run(remove::remove_stranded_bundles)
    }

    pub fn migrate_up(&self) -> Result<()> {
        self.store
            .with_writer(|conn| opreg_store::Migrator::new().up(conn).map_err(|e| Error::TransactionFailure(e.to_string())))
    }

    pub fn migrate_down(&self) -> Result<()> {
        self.store
            .with_writer(|conn| opreg_store::Migrator::new().down(conn).map_err(|e| Error::TransactionFailure(e.to_string())))
    }

    /// Runs `f` inside its own transaction against the writer
    /// connection, committing on success and rolling back on error.
    fn run<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> Result<T>) -> Result<T> {
        self.store.with_writer(|conn| {
            let tx = conn.transaction().map_err(|e| Error::TransactionFailure(e.to_string()))?;
            let result = f(&tx);
            match result {
                Ok(value) => {
                    tx.commit().map_err(|e| Error::TransactionFailure(e.to_string()))?;
                    Ok(value)
                }
                Err(err) => Err(err),
            }
        })
    }
}

pub(crate) fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during bundle load".to_string()
    }
}
