//! Walks a directory of operator bundle manifests, classifies each
//! document, and yields a normalized `Bundle` per bundle directory plus
//! any package manifests found along the way (`spec.md` §4.1).

mod annotations;
mod bundle_builder;
mod classify;
mod csv;
mod package_manifest;
mod walk;

pub use csv::CsvDoc;

use opreg_model::{Bundle, LoadErrors, PackageManifest};
use std::path::Path;

/// Everything the Manifest Parser produced from one directory walk.
#[derive(Default)]
pub struct ParseOutput {
    pub bundles: Vec<Bundle>,
    pub package_manifests: Vec<PackageManifest>,
    pub warnings: Vec<String>,
    pub errors: LoadErrors,
}

/// Walks `root` and parses every bundle and package manifest it contains.
/// Per-bundle build failures (missing name, missing version, a CRD
/// declared owned but absent from the object set, ...) are aggregated into
/// `errors` rather than aborting the walk — callers in strict mode should
/// call `errors.into_first_result()`.
pub fn parse_directory(root: &Path) -> ParseOutput {
    let scanned = walk::scan(root);
    let mut out = ParseOutput {
        warnings: scanned.warnings,
        ..Default::default()
    };

    for raw_manifest in &scanned.package_manifests {
        if let Some(manifest) = package_manifest::try_parse(raw_manifest) {
            out.package_manifests.push(manifest);
        }
    }

    for pending in &scanned.bundles {
        let csv_doc = CsvDoc::new(&pending.csv);
        let csv_name = csv_doc.name().map(opreg_model::CsvName::new);

        let fallback_from_annotations = pending.annotations.as_ref().and_then(|a| {
            csv_name
                .as_ref()
                .and_then(|csv| annotations::try_parse(a, csv))
        });
        if let Some(manifest) = &fallback_from_annotations {
            out.package_manifests.push(manifest.clone());
        }
        let fallback_package_name = fallback_from_annotations.as_ref().map(|m| m.package_name.clone());

        match bundle_builder::build(pending, fallback_package_name.as_ref()) {
            Ok(bundle) => out.bundles.push(bundle),
            Err(err) => {
                let key = csv_name.unwrap_or_else(|| opreg_model::CsvName::new("<unknown>"));
                out.errors.push(key, err);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &std::path::Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn parses_etcd_style_package() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg_dir = tmp.path().join("etcd");
        write_file(
            &pkg_dir.join("etcd.package.yaml"),
            "packageName: etcd\ndefaultChannel: alpha\nchannels:\n  - name: alpha\n    currentCSVName: etcdoperator.v0.9.2\n  - name: stable\n    currentCSVName: etcdoperator.v0.9.2\n",
        );
        write_file(
            &pkg_dir.join("0.9.2/manifests/etcd.clusterserviceversion.yaml"),
            "kind: ClusterServiceVersion\nmetadata:\n  name: etcdoperator.v0.9.2\n  annotations:\n    olm.package: etcd\nspec:\n  version: 0.9.2\n  replaces: etcdoperator.v0.9.0\n  skips: [etcdoperator.v0.9.1]\n  customresourcedefinitions:\n    owned:\n      - name: etcdclusters.etcd.database.coreos.com\n        kind: EtcdCluster\n        version: v1beta2\n",
        );
        write_file(
            &pkg_dir.join("0.9.2/manifests/etcdclusters.crd.yaml"),
            "kind: CustomResourceDefinition\nmetadata:\n  name: etcdclusters.etcd.database.coreos.com\n",
        );

        let out = parse_directory(tmp.path());
        assert_eq!(out.bundles.len(), 1);
        assert_eq!(out.package_manifests.len(), 1);
        assert!(out.errors.is_empty());
        assert_eq!(out.bundles[0].package_name.as_str(), "etcd");
    }
}
