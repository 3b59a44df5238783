use serde::{Deserialize, Serialize};

/// A (bundle, image reference) association. `image` must be non-empty —
/// the registry's own invariant, mirrored by a `CHECK` constraint at the
/// store layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedImage {
    pub name: String,
    pub image: String,
}

impl RelatedImage {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Option<Self> {
        let image = image.into();
        if image.is_empty() {
            return None;
        }
        Some(Self {
            name: name.into(),
            image,
        })
    }
}
