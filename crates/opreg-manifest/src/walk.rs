use serde::Deserialize as _;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::classify::{classify, DocKind};

/// One decoded document, tagged with where it came from.
struct DecodedDoc {
    path: PathBuf,
    file_name: String,
    value: Value,
}

/// Every document belonging to one bundle directory: the anchoring CSV
/// plus every other non-hidden, decodable document alongside it
/// (`spec.md` §4.1 — "the containing directory is re-scanned and every
/// non-hidden, decodable document in it is collected as that bundle's
/// objects").
pub struct PendingBundle {
    pub csv: Value,
    pub objects: Vec<Value>,
    pub source_dir: PathBuf,
    /// An annotations.yaml found as a sibling `metadata/` directory, if any.
    pub annotations: Option<Value>,
}

#[derive(Default)]
pub struct ScanOutput {
    pub bundles: Vec<PendingBundle>,
    pub package_manifests: Vec<Value>,
    pub warnings: Vec<String>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .path()
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

/// Attempts to decode `path` as a multi-document YAML/JSON stream. Returns
/// an empty vec (not an error) for files that don't parse — per §4.1 the
/// parser only acts on documents it can decode, it does not fail the walk
/// on an unrelated or malformed file.
fn decode_file(path: &Path) -> Vec<Value> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    serde_yaml::Deserializer::from_str(&content)
        .filter_map(|doc| Value::deserialize(doc).ok())
        .filter(|v| !v.is_null())
        .collect()
}

/// Walks `root`, classifying every decodable document, and assembles
/// bundles and package manifests per `spec.md` §4.1.
pub fn scan(root: &Path) -> ScanOutput {
    let mut out = ScanOutput::default();

    // First pass: decode every file once, tagging CSV locations by their
    // containing directory so each bundle directory is visited exactly
    // once in the second pass, regardless of how many files it has.
    let mut csv_dirs: BTreeMap<PathBuf, Vec<DecodedDoc>> = BTreeMap::new();
    let mut annotations_by_dir: BTreeMap<PathBuf, Value> = BTreeMap::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path().to_path_buf();
        let file_name = entry.file_name().to_string_lossy().to_string();

        for value in decode_file(&path) {
            match classify(&value, &file_name) {
                DocKind::ClusterServiceVersion => {
                    if let Some(dir) = path.parent() {
                        csv_dirs.entry(dir.to_path_buf()).or_default().push(DecodedDoc {
                            path: path.clone(),
                            file_name: file_name.clone(),
                            value,
                        });
                    }
                }
                DocKind::PackageManifest => out.package_manifests.push(value),
                DocKind::AnnotationsFile => {
                    // annotations.yaml sits under `metadata/`, a sibling
                    // of the bundle's `manifests/` directory.
                    if let Some(metadata_dir) = path.parent() {
                        if let Some(bundle_dir) = metadata_dir.parent() {
                            annotations_by_dir.insert(bundle_dir.to_path_buf(), value.clone());
                        }
                    }
                }
                DocKind::Other => {}
            }
        }
    }

    // Second pass: for each CSV-bearing directory, re-scan every file in
    // that directory and collect non-CSV documents as the bundle's
    // objects. Only the CSV matching the anchoring name is retained; other
    // CSV documents found in the same directory are discarded (§4.1).
    for (dir, csvs) in csv_dirs {
        let Some(anchor) = csvs.first() else { continue };
        let anchor_name = anchor.value.pointer("/metadata/name").and_then(Value::as_str);

        let mut objects = Vec::new();
        if let Ok(read_dir) = std::fs::read_dir(&dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                for value in decode_file(&path) {
                    if classify(&value, &file_name) == DocKind::ClusterServiceVersion {
                        // Already handled as `anchor`/discarded duplicate.
                        continue;
                    }
                    objects.push(value);
                }
            }
        }

        if objects.is_empty() {
            warn!(
                directory = %dir.display(),
                csv = anchor_name.unwrap_or("<unnamed>"),
                "bundle directory contains no objects"
            );
            out.warnings.push(format!(
                "bundle directory {} (csv {}) contains no objects",
                dir.display(),
                anchor_name.unwrap_or("<unnamed>")
            ));
        }

        let bundle_root = dir.parent().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
        out.bundles.push(PendingBundle {
            csv: anchor.value.clone(),
            objects,
            source_dir: dir.clone(),
            annotations: annotations_by_dir.get(&bundle_root).cloned(),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn scans_a_bundle_directory_with_annotations() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg_dir = tmp.path().join("etcd");
        let bundle_dir = pkg_dir.join("0.9.2");
        write_file(
            &bundle_dir.join("manifests/etcdoperator.clusterserviceversion.yaml"),
            "kind: ClusterServiceVersion\nmetadata:\n  name: etcdoperator.v0.9.2\n  annotations:\n    olm.package: etcd\nspec:\n  version: 0.9.2\n",
        );
        write_file(
            &bundle_dir.join("manifests/etcdclusters.crd.yaml"),
            "kind: CustomResourceDefinition\nmetadata:\n  name: etcdclusters.etcd.database.coreos.com\n",
        );
        write_file(
            &bundle_dir.join("metadata/annotations.yaml"),
            "annotations:\n  operators.operatorframework.io.bundle.package.v1: etcd\n  operators.operatorframework.io.bundle.channels.v1: alpha\n",
        );
        write_file(
            &pkg_dir.join("etcd.package.yaml"),
            "packageName: etcd\ndefaultChannel: alpha\nchannels:\n  - name: alpha\n    currentCSVName: etcdoperator.v0.9.2\n",
        );

        let out = scan(tmp.path());
        assert_eq!(out.bundles.len(), 1);
        assert_eq!(out.package_manifests.len(), 1);
        assert_eq!(out.bundles[0].objects.len(), 1);
        assert!(out.bundles[0].annotations.is_some());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn warns_on_empty_bundle_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            &tmp.path().join("foo/manifests/foo.clusterserviceversion.yaml"),
            "kind: ClusterServiceVersion\nmetadata:\n  name: foo.v1\n",
        );
        let out = scan(tmp.path());
        assert_eq!(out.bundles.len(), 1);
        assert!(out.bundles[0].objects.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn skips_hidden_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            &tmp.path().join(".git/config"),
            "kind: ClusterServiceVersion\nmetadata:\n  name: should-not-appear\n",
        );
        let out = scan(tmp.path());
        assert!(out.bundles.is_empty());
    }
}
