use opreg_model::{Api, CsvName, RelatedImage, SkipRange, Version};
use serde_json::Value;
use std::collections::BTreeSet;

/// A thin, read-only view over a ClusterServiceVersion document. The
/// document itself stays an opaque `serde_json::Value` (per `spec.md` §3,
/// the CSV is an "opaque serialized payload") — this type only knows how
/// to pick the handful of fields the Bundle Model needs out of it.
pub struct CsvDoc<'a> {
    pub raw: &'a Value,
}

impl<'a> CsvDoc<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> Option<&str> {
        self.raw.pointer("/metadata/name")?.as_str()
    }

    /// The package name from the `olm.package` CSV annotation, if present.
    pub fn package_annotation(&self) -> Option<&str> {
        self.raw
            .pointer("/metadata/annotations/olm.package")?
            .as_str()
    }

    pub fn version(&self) -> Option<Version> {
        let raw = self.raw.pointer("/spec/version")?.as_str()?;
        Version::parse(raw).ok()
    }

    pub fn replaces(&self) -> Option<CsvName> {
        let raw = self.raw.pointer("/spec/replaces")?.as_str()?;
        if raw.is_empty() {
            None
        } else {
            Some(CsvName::new(raw))
        }
    }

    pub fn skips(&self) -> Vec<CsvName> {
        self.raw
            .pointer("/spec/skips")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(CsvName::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn skip_range(&self) -> Option<SkipRange> {
        let raw = self
            .raw
            .pointer("/metadata/annotations/olm.skipRange")
            .and_then(Value::as_str)
            .or_else(|| self.raw.pointer("/spec/skipRange").and_then(Value::as_str))?;
        SkipRange::parse(raw).ok()
    }

    /// Owned CRD APIs: one `Api` per (group, each declared version, kind,
    /// plural), per `spec.md` §4.2.
    pub fn owned_crd_apis(&self) -> Vec<Api> {
        crd_entries(self.raw, "/spec/customresourcedefinitions/owned")
    }

    pub fn required_crd_apis(&self) -> Vec<Api> {
        crd_entries(self.raw, "/spec/customresourcedefinitions/required")
    }

    pub fn owned_api_service_apis(&self) -> Vec<Api> {
        api_service_entries(self.raw, "/spec/apiservicedefinitions/owned")
    }

    pub fn required_api_service_apis(&self) -> Vec<Api> {
        api_service_entries(self.raw, "/spec/apiservicedefinitions/required")
    }

    /// Related images from the CSV's explicit `relatedImages` section, its
    /// deployment container `image` fields, and any `RELATED_IMAGE_*`
    /// environment variable references — deduplicated by image reference.
    pub fn related_images(&self) -> Vec<RelatedImage> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut push = |name: String, image: String| {
            if seen.insert((name.clone(), image.clone())) {
                if let Some(ri) = RelatedImage::new(name, image) {
                    out.push(ri);
                }
            }
        };

        if let Some(items) = self
            .raw
            .pointer("/spec/relatedImages")
            .and_then(Value::as_array)
        {
            for item in items {
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if let Some(image) = item.get("image").and_then(Value::as_str) {
                    push(name, image.to_string());
                }
            }
        }

        for deployment in self.deployments() {
            for container in containers(deployment) {
                let container_name = container
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if let Some(image) = container.get("image").and_then(Value::as_str) {
                    push(container_name.clone(), image.to_string());
                }
                if let Some(envs) = container.get("env").and_then(Value::as_array) {
                    for env in envs {
                        let env_name = env.get("name").and_then(Value::as_str).unwrap_or_default();
                        if env_name.starts_with("RELATED_IMAGE_") {
                            if let Some(image) = env.get("value").and_then(Value::as_str) {
                                push(env_name.to_string(), image.to_string());
                            }
                        }
                    }
                }
            }
        }

        out
    }

    fn deployments(&self) -> Vec<&Value> {
        self.raw
            .pointer("/spec/install/spec/deployments")
            .and_then(Value::as_array)
            .map(|items| items.iter().collect())
            .unwrap_or_default()
    }
}

fn containers(deployment: &Value) -> Vec<&Value> {
    deployment
        .pointer("/spec/template/spec/containers")
        .and_then(Value::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

fn crd_entries(raw: &Value, pointer: &str) -> Vec<Api> {
    raw.pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .flat_map(|item| {
                    let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
                    let (group, plural) = split_crd_name(name);
                    let kind = item.get("kind").and_then(Value::as_str).unwrap_or_default();

                    // A CRD may declare a single `version` string or a
                    // `versions[].name` list; every declared version
                    // yields its own provided/required Api (spec.md §4.2).
                    let mut versions: Vec<String> = item
                        .get("versions")
                        .and_then(Value::as_array)
                        .map(|vs| {
                            vs.iter()
                                .filter_map(|v| v.get("name").and_then(Value::as_str))
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    if versions.is_empty() {
                        if let Some(v) = item.get("version").and_then(Value::as_str) {
                            versions.push(v.to_string());
                        }
                    }

                    versions
                        .into_iter()
                        .map(move |version| Api::new(group.clone(), version, kind, plural.clone()))
                        .collect::<Vec<_>>()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn api_service_entries(raw: &Value, pointer: &str) -> Vec<Api> {
    raw.pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    Api::new(
                        item.get("group").and_then(Value::as_str).unwrap_or_default(),
                        item.get("version").and_then(Value::as_str).unwrap_or_default(),
                        item.get("kind").and_then(Value::as_str).unwrap_or_default(),
                        item.get("name").and_then(Value::as_str).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Owned-CRD `name` fields are conventionally `<plural>.<group>`.
fn split_crd_name(name: &str) -> (String, String) {
    match name.split_once('.') {
        Some((plural, group)) => (group.to_string(), plural.to_string()),
        None => (String::new(), name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv() -> Value {
        serde_json::json!({
            "metadata": {
                "name": "etcdoperator.v0.9.2",
                "annotations": { "olm.package": "etcd", "olm.skipRange": ">=0.9.0 <0.9.2" },
            },
            "spec": {
                "version": "0.9.2",
                "replaces": "etcdoperator.v0.9.0",
                "skips": ["etcdoperator.v0.9.1"],
                "customresourcedefinitions": {
                    "owned": [
                        {"name": "etcdclusters.etcd.database.coreos.com", "kind": "EtcdCluster", "version": "v1beta2"},
                    ],
                },
                "relatedImages": [
                    {"name": "etcd-operator", "image": "quay.io/coreos/etcd-operator@sha256:abc"},
                ],
            },
        })
    }

    #[test]
    fn extracts_identity_and_version() {
        let raw = sample_csv();
        let csv = CsvDoc::new(&raw);
        assert_eq!(csv.name(), Some("etcdoperator.v0.9.2"));
        assert_eq!(csv.package_annotation(), Some("etcd"));
        assert_eq!(csv.version().unwrap().to_string(), "0.9.2");
        assert_eq!(csv.replaces(), Some(CsvName::new("etcdoperator.v0.9.0")));
        assert_eq!(csv.skips(), vec![CsvName::new("etcdoperator.v0.9.1")]);
        assert!(csv.skip_range().is_some());
    }

    #[test]
    fn extracts_owned_apis_and_related_images() {
        let raw = sample_csv();
        let csv = CsvDoc::new(&raw);
        let owned = csv.owned_crd_apis();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].group, "etcd.database.coreos.com");
        assert_eq!(owned[0].kind, "EtcdCluster");
        assert_eq!(owned[0].plural, "etcdclusters");

        let images = csv.related_images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].image, "quay.io/coreos/etcd-operator@sha256:abc");
    }
}
