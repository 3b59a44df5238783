use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A bundle's own release version. Wraps `semver::Version` so that
/// `skippatch` ordering and `semver` update mode can compare bundles
/// directly instead of re-parsing strings at every call site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(semver::Version);

impl Version {
    pub fn parse(s: &str) -> Result<Self, semver::Error> {
        Ok(Self(semver::Version::parse(s)?))
    }

    pub fn inner(&self) -> &semver::Version {
        &self.0
    }

    /// True when `self` and `other` share the same major.minor, the
    /// grouping `skippatch` update mode treats as mutually-skipping.
    pub fn same_major_minor(&self, other: &Version) -> bool {
        self.0.major == other.0.major && self.0.minor == other.0.minor
    }
}

impl FromStr for Version {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(|err| D::Error::custom(format!("invalid version: {err}")))
    }
}

/// A semver range of versions a bundle's `skipRange` substitutes.
#[derive(Debug, Clone)]
pub struct SkipRange(semver::VersionReq);

impl SkipRange {
    pub fn parse(s: &str) -> Result<Self, semver::Error> {
        Ok(Self(semver::VersionReq::parse(s)?))
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.0.matches(version.inner())
    }
}

impl std::fmt::Display for SkipRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SkipRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SkipRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let raw = String::deserialize(deserializer)?;
        SkipRange::parse(&raw).map_err(|err| D::Error::custom(format!("invalid skip range: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_major_minor_groups_patches() {
        let a = Version::parse("1.0.1").unwrap();
        let b = Version::parse("1.0.2-rc0").unwrap();
        let c = Version::parse("1.1.0").unwrap();
        assert!(a.same_major_minor(&b));
        assert!(!a.same_major_minor(&c));
    }

    #[test]
    fn skip_range_matches() {
        let range = SkipRange::parse(">=0.9.0 <0.9.2").unwrap();
        assert!(range.matches(&Version::parse("0.9.1").unwrap()));
        assert!(!range.matches(&Version::parse("0.9.2").unwrap()));
    }
}
