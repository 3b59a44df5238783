use opreg_model::{ChannelManifest, ChannelName, CsvName, PackageManifest, PackageName};
use serde::Deserialize;

const ANNOTATION_PACKAGE: &str = "operators.operatorframework.io.bundle.package.v1";
const ANNOTATION_CHANNELS: &str = "operators.operatorframework.io.bundle.channels.v1";
const ANNOTATION_DEFAULT_CHANNEL: &str = "operators.operatorframework.io.bundle.channel.default.v1";

#[derive(Debug, Deserialize)]
struct RawAnnotationsFile {
    annotations: std::collections::BTreeMap<String, String>,
}

/// A bundle's `metadata/annotations.yaml` provides package name, channel
/// list, and default channel when no package manifest is present
/// (`spec.md` §4.1, §6). Unlike a package manifest, it names a single
/// bundle's channel membership, not a head CSV per channel — so the
/// caller supplies the CSV name this bundle anchors.
pub fn try_parse(value: &serde_yaml::Value, anchoring_csv: &CsvName) -> Option<PackageManifest> {
    let raw: RawAnnotationsFile = serde_yaml::from_value(value.clone()).ok()?;
    let package_name = raw.annotations.get(ANNOTATION_PACKAGE)?.clone();
    let channels_csv = raw.annotations.get(ANNOTATION_CHANNELS)?;
    let default_channel = raw
        .annotations
        .get(ANNOTATION_DEFAULT_CHANNEL)
        .cloned()
        .or_else(|| channels_csv.split(',').next().map(str::to_string))?;

    let channels = channels_csv
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| ChannelManifest {
            name: ChannelName::new(name),
            current_csv_name: anchoring_csv.clone(),
        })
        .collect::<Vec<_>>();

    if channels.is_empty() {
        return None;
    }

    Some(PackageManifest {
        package_name: PackageName::new(package_name),
        default_channel: ChannelName::new(default_channel),
        channels,
    })
}
