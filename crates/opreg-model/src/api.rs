use serde::{Deserialize, Serialize};

/// A (group, version, kind, plural) 4-tuple identifying a Kubernetes API.
/// `plural` is carried for provided APIs (owned CRDs declare it) but is
/// frequently empty for required APIs, which only need group/version/kind
/// to match against what another bundle provides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Api {
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(default)]
    pub plural: String,
}

impl Api {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: plural.into(),
        }
    }

    /// The (group, version, kind) projection used to match a provided API
    /// against a required API, ignoring plural.
    pub fn gvk(&self) -> (&str, &str, &str) {
        (&self.group, &self.version, &self.kind)
    }
}

impl std::fmt::Display for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}
