use crate::{package, rows};
use opreg_manifest::ParseOutput;
use opreg_model::{Bundle, CsvName, Error, LoadErrors, PackageName, UpdateMode};
use opreg_store::Store;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, warn};

/// Ingests a whole directory scan: every bundle is written, then every
/// package's declared channels are wired against its own bundle set. In
/// strict mode, any error rolls the entire load back; in permissive
/// mode, whatever loaded successfully is kept (`spec.md` §4.4, "Failure
/// semantics").
pub fn load_directory(store: &Store, parsed: &ParseOutput, mode: UpdateMode, permissive: bool) -> opreg_model::Result<LoadErrors> {
    let mut errors = LoadErrors::new();
    for (csv, err) in &parsed.errors.errors {
        errors.push(csv.clone(), err.clone());
    }
    for warning in &parsed.warnings {
        warn!(%warning, "manifest parser warning");
    }

    let mut by_package: HashMap<PackageName, Vec<Bundle>> = HashMap::new();
    for bundle in &parsed.bundles {
        by_package.entry(bundle.package_name.clone()).or_default().push(bundle.clone());
    }

    let load_errors = store.with_writer(|conn| {
        let tx = conn.transaction().map_err(|e| Error::TransactionFailure(e.to_string()))?;
        let mut errors = LoadErrors::new();

        for manifest in &parsed.package_manifests {
            let Some(bundles) = by_package.get(&manifest.package_name) else {
                continue;
            };

            let outcome = catch_unwind(AssertUnwindSafe(|| -> opreg_model::Result<LoadErrors> {
                for bundle in bundles {
                    rows::upsert_operator_bundle_row(&tx, bundle)?;
                }
                package::add_package_channels(&tx, manifest, bundles, mode).map_err(|e| Error::TransactionFailure(e.to_string()))
            }));

            match outcome {
                Ok(Ok(package_errors)) => errors.errors.extend(package_errors.errors),
                Ok(Err(err)) => errors.push(CsvName::new(manifest.package_name.to_string()), err),
                Err(panic) => errors.push(CsvName::new(manifest.package_name.to_string()), Error::Generic(crate::panic_message(panic))),
            }
        }

        if !permissive && !errors.is_empty() {
            drop(tx);
            return Ok(errors);
        }

        tx.commit().map_err(|e| Error::TransactionFailure(e.to_string()))?;
        info!(packages = parsed.package_manifests.len(), bundles = parsed.bundles.len(), "directory load complete");
        Ok(errors)
    })?;

    errors.errors.extend(load_errors.errors);
    Ok(errors)
}
