use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The well-known property types the registry interprets specially.
/// Anything else round-trips as `Opaque` — the properties table does not
/// require a closed set of types, only that `olm.package` be present
/// exactly once per bundle (enforced by the Loader, not this type).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyType {
    Package,
    Gvk,
    GvkRequired,
    PackageRequired,
    Label,
    Deprecated,
    Channel,
    SkipRange,
    Skips,
    Opaque(String),
}

impl PropertyType {
    pub fn as_str(&self) -> &str {
        match self {
            PropertyType::Package => "olm.package",
            PropertyType::Gvk => "olm.gvk",
            PropertyType::GvkRequired => "olm.gvk.required",
            PropertyType::PackageRequired => "olm.package.required",
            PropertyType::Label => "olm.label",
            PropertyType::Deprecated => "olm.deprecated",
            PropertyType::Channel => "olm.channel",
            PropertyType::SkipRange => "olm.skipRange",
            PropertyType::Skips => "olm.skips",
            PropertyType::Opaque(s) => s,
        }
    }
}

impl From<&str> for PropertyType {
    fn from(s: &str) -> Self {
        match s {
            "olm.package" => PropertyType::Package,
            "olm.gvk" => PropertyType::Gvk,
            "olm.gvk.required" => PropertyType::GvkRequired,
            "olm.package.required" => PropertyType::PackageRequired,
            "olm.label" => PropertyType::Label,
            "olm.deprecated" => PropertyType::Deprecated,
            "olm.channel" => PropertyType::Channel,
            "olm.skipRange" => PropertyType::SkipRange,
            "olm.skips" => PropertyType::Skips,
            other => PropertyType::Opaque(other.to_string()),
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, JSON-valued attribute of a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub property_type: String,
    pub value: Value,
}

impl Property {
    pub fn new(property_type: PropertyType, value: Value) -> Self {
        Self {
            property_type: property_type.as_str().to_string(),
            value,
        }
    }

    pub fn kind(&self) -> PropertyType {
        PropertyType::from(self.property_type.as_str())
    }

    /// The `olm.package` property every bundle must carry exactly once:
    /// `{"packageName": ..., "version": ...}`.
    pub fn package(package_name: &str, version: &str) -> Self {
        Self::new(
            PropertyType::Package,
            serde_json::json!({ "packageName": package_name, "version": version }),
        )
    }

    pub fn gvk(api: &super::Api) -> Self {
        Self::new(
            PropertyType::Gvk,
            serde_json::json!({ "group": api.group, "version": api.version, "kind": api.kind }),
        )
    }

    pub fn gvk_required(api: &super::Api) -> Self {
        Self::new(
            PropertyType::GvkRequired,
            serde_json::json!({ "group": api.group, "version": api.version, "kind": api.kind }),
        )
    }

    pub fn deprecated() -> Self {
        Self::new(PropertyType::Deprecated, serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn property_type_round_trips_through_str() {
        let known = [
            PropertyType::Package,
            PropertyType::Gvk,
            PropertyType::GvkRequired,
            PropertyType::PackageRequired,
            PropertyType::Label,
            PropertyType::Deprecated,
            PropertyType::Channel,
            PropertyType::SkipRange,
            PropertyType::Skips,
        ];
        for kind in known {
            assert_eq!(PropertyType::from(kind.as_str()), kind);
        }
        assert_eq!(
            PropertyType::from("com.example.custom"),
            PropertyType::Opaque("com.example.custom".to_string())
        );
    }
}
