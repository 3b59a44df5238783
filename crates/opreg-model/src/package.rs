use crate::{ChannelName, CsvName, PackageName};

/// A named operator product.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: PackageName,
    pub default_channel: ChannelName,
    pub add_mode: Option<String>,
    pub channels: Vec<Channel>,
}

/// A release stream within a package.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: ChannelName,
    pub package_name: PackageName,
    pub head: CsvName,
}

/// The manifest-level declaration of a package's channels, as read from a
/// `<pkg>.package.yaml` or `metadata/annotations.yaml`. Distinct from
/// `Package`/`Channel` above (which describe the persisted, graph-bearing
/// form) because the manifest form only names a head CSV, not a full graph.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    pub package_name: PackageName,
    pub default_channel: ChannelName,
    pub channels: Vec<ChannelManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelManifest {
    pub name: ChannelName,
    pub current_csv_name: CsvName,
}
