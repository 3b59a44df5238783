use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed JSON value expressing a bundle's dependency on another package
/// or on a provided API, sourced either from an explicit `dependencies.yaml`
/// or derived from the bundle's required APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyType {
    Package,
    Gvk,
    Label,
}

impl Dependency {
    pub fn package(package_name: &str, version_range: &str) -> Self {
        Self {
            dependency_type: DependencyType::Package,
            value: serde_json::json!({
                "packageName": package_name,
                "version": version_range,
            }),
        }
    }

    pub fn gvk(api: &super::Api) -> Self {
        Self {
            dependency_type: DependencyType::Gvk,
            value: serde_json::json!({
                "group": api.group,
                "version": api.version,
                "kind": api.kind,
            }),
        }
    }

    /// Structural validation of a dependency value against the minimal
    /// shape its declared type requires. Bundle manifests that fail this
    /// check produce `Error::ValidationFailure` at load time.
    pub fn validate(&self) -> Result<(), String> {
        let obj = self
            .value
            .as_object()
            .ok_or_else(|| "dependency value must be a JSON object".to_string())?;

        let required_fields: &[&str] = match self.dependency_type {
            DependencyType::Package => &["packageName", "version"],
            DependencyType::Gvk => &["group", "version", "kind"],
            DependencyType::Label => &["label"],
        };

        for field in required_fields {
            if !obj.contains_key(*field) {
                return Err(format!(
                    "dependency of type {:?} missing required field '{}'",
                    self.dependency_type, field
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_dependency_validates() {
        let dep = Dependency::package("etcd", ">=0.9.0");
        assert!(dep.validate().is_ok());
    }

    #[test]
    fn malformed_dependency_value_fails_validation() {
        let dep = Dependency {
            dependency_type: DependencyType::Gvk,
            value: serde_json::json!({ "group": "etcd.database.coreos.com" }),
        };
        assert!(dep.validate().is_err());
    }
}
