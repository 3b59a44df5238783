use crate::{Api, CsvName, Dependency, PackageName, Property, RelatedImage, Version};
use serde_json::Value;

/// A versioned operator release, anchored by its ClusterServiceVersion.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub csv_name: CsvName,
    pub package_name: PackageName,
    pub version: Version,
    /// Opaque image reference the bundle was sourced from; empty for
    /// directory-sourced bundles.
    pub bundle_path: String,
    pub skip_range: Option<crate::SkipRange>,
    pub replaces: Option<CsvName>,
    pub skips: Vec<CsvName>,
    /// The CSV document, serialized opaque payload.
    pub csv: Value,
    /// Every non-CSV object manifest in the bundle directory, serialized
    /// opaque payloads.
    pub objects: Vec<Value>,
    pub related_images: Vec<RelatedImage>,
    pub provided_apis: Vec<Api>,
    pub required_apis: Vec<Api>,
    pub properties: Vec<Property>,
    pub dependencies: Vec<Dependency>,
}

impl Bundle {
    /// Every bundle must carry exactly one `olm.package` property (§3).
    /// This is enforced here so any construction path (manifest parsing,
    /// round-tripping from the store) gets it for free.
    pub fn ensure_package_property(&mut self) {
        let has_package_property = self
            .properties
            .iter()
            .any(|p| matches!(p.kind(), crate::PropertyType::Package));
        if !has_package_property {
            self.properties.push(Property::package(
                self.package_name.as_str(),
                &self.version.to_string(),
            ));
        }
    }

    /// Whether this bundle provides the given API, ignoring `plural`.
    pub fn provides(&self, api: &Api) -> bool {
        self.provided_apis.iter().any(|p| p.gvk() == api.gvk())
    }

    pub fn requires(&self, api: &Api) -> bool {
        self.required_apis.iter().any(|r| r.gvk() == api.gvk())
    }
}

/// Identifying key for a bundle, used throughout the graph loader and
/// query layer when the full `Bundle` record isn't needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleKey {
    pub csv_name: CsvName,
    pub version: Version,
    pub bundle_path: String,
}

impl std::fmt::Display for BundleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.csv_name)
    }
}
