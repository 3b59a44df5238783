use serde_yaml::Value;

/// What kind of document a decoded YAML/JSON document turned out to be,
/// per `spec.md` §4.1. `Other` covers CRDs and any other object manifest
/// that rides along in a bundle directory without needing its own
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    ClusterServiceVersion,
    PackageManifest,
    AnnotationsFile,
    Other,
}

pub fn classify(doc: &Value, file_name: &str) -> DocKind {
    if let Some(kind) = doc.get("kind").and_then(Value::as_str) {
        if kind == "ClusterServiceVersion" {
            return DocKind::ClusterServiceVersion;
        }
    }

    let looks_like_package_manifest = doc.get("packageName").is_some()
        && doc.get("defaultChannel").is_some()
        && doc
            .get("channels")
            .and_then(Value::as_sequence)
            .map(|seq| !seq.is_empty())
            .unwrap_or(false);
    if looks_like_package_manifest {
        return DocKind::PackageManifest;
    }

    if file_name == "annotations.yaml" && doc.get("annotations").is_some() {
        return DocKind::AnnotationsFile;
    }

    DocKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_csv() {
        let doc: Value = serde_yaml::from_str("kind: ClusterServiceVersion\nmetadata:\n  name: x\n").unwrap();
        assert_eq!(classify(&doc, "csv.yaml"), DocKind::ClusterServiceVersion);
    }

    #[test]
    fn classifies_package_manifest() {
        let doc: Value = serde_yaml::from_str(
            "packageName: etcd\ndefaultChannel: alpha\nchannels:\n  - name: alpha\n    currentCSVName: x\n",
        )
        .unwrap();
        assert_eq!(classify(&doc, "etcd.package.yaml"), DocKind::PackageManifest);
    }

    #[test]
    fn classifies_annotations_file() {
        let doc: Value = serde_yaml::from_str("annotations:\n  a: b\n").unwrap();
        assert_eq!(classify(&doc, "annotations.yaml"), DocKind::AnnotationsFile);
    }

    #[test]
    fn classifies_other() {
        let doc: Value = serde_yaml::from_str("kind: CustomResourceDefinition\n").unwrap();
        assert_eq!(classify(&doc, "crd.yaml"), DocKind::Other);
    }
}
