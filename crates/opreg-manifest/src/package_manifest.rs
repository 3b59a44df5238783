use opreg_model::{ChannelManifest, ChannelName, CsvName, PackageManifest, PackageName};
use serde::Deserialize;

/// The `<pkg>.package.yaml` schema (`spec.md` §4.1, §6).
#[derive(Debug, Deserialize)]
pub struct RawPackageManifest {
    #[serde(rename = "packageName")]
    pub package_name: String,
    #[serde(rename = "defaultChannel")]
    pub default_channel: String,
    pub channels: Vec<RawChannel>,
}

#[derive(Debug, Deserialize)]
pub struct RawChannel {
    pub name: String,
    #[serde(rename = "currentCSVName")]
    pub current_csv_name: String,
}

impl From<RawPackageManifest> for PackageManifest {
    fn from(raw: RawPackageManifest) -> Self {
        PackageManifest {
            package_name: PackageName::new(raw.package_name),
            default_channel: ChannelName::new(raw.default_channel),
            channels: raw
                .channels
                .into_iter()
                .map(|c| ChannelManifest {
                    name: ChannelName::new(c.name),
                    current_csv_name: CsvName::new(c.current_csv_name),
                })
                .collect(),
        }
    }
}

/// A document matches the package-manifest schema when it carries all of
/// `packageName`, `defaultChannel`, and a non-empty `channels` array with
/// `name`/`currentCSVName` entries (`spec.md` §4.1).
pub fn try_parse(value: &serde_yaml::Value) -> Option<PackageManifest> {
    let raw: RawPackageManifest = serde_yaml::from_value(value.clone()).ok()?;
    if raw.channels.is_empty() {
        return None;
    }
    Some(raw.into())
}
