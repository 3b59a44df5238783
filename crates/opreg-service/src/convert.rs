//! One-way translation from internal records (`opreg_model`) to the wire
//! schema (`opreg_proto::catalog`). The query layer never runs in reverse —
//! every RPC this facade exposes is a read, so there is no proto-to-model
//! direction to maintain.

use opreg_model::{Api, Bundle, Channel, ChannelEntry, Dependency, DependencyType, Package, Property, RelatedImage};
use opreg_proto::catalog as proto;

pub(crate) fn api_to_proto(api: &Api) -> proto::Api {
    proto::Api { group: api.group.clone(), version: api.version.clone(), kind: api.kind.clone(), plural: api.plural.clone() }
}

pub(crate) fn property_to_proto(property: &Property) -> proto::Property {
    proto::Property { r#type: property.property_type.clone(), value_json: property.value.to_string() }
}

fn dependency_type_str(dependency_type: DependencyType) -> &'static str {
    match dependency_type {
        DependencyType::Package => "package",
        DependencyType::Gvk => "gvk",
        DependencyType::Label => "label",
    }
}

pub(crate) fn dependency_to_proto(dependency: &Dependency) -> proto::Dependency {
    proto::Dependency { r#type: dependency_type_str(dependency.dependency_type).to_string(), value_json: dependency.value.to_string() }
}

pub(crate) fn related_image_to_proto(image: &RelatedImage) -> proto::RelatedImage {
    proto::RelatedImage { name: image.name.clone(), image: image.image.clone() }
}

/// `channel_name` carries the channel a lookup was scoped to; it is empty
/// when the query wasn't channel-specific (`ListBundles`,
/// `GetDefaultBundleThatProvides`) since a bundle does not own a single
/// channel of its own.
pub(crate) fn bundle_to_proto(bundle: Bundle, channel_name: &str) -> proto::Bundle {
    proto::Bundle {
        csv_name: bundle.csv_name.to_string(),
        package_name: bundle.package_name.to_string(),
        channel_name: channel_name.to_string(),
        csv_json: bundle.csv.to_string(),
        object_json: bundle.objects.iter().map(|v| v.to_string()).collect(),
        bundle_path: bundle.bundle_path,
        version: bundle.version.to_string(),
        skip_range: bundle.skip_range.as_ref().map(ToString::to_string).unwrap_or_default(),
        provided_apis: bundle.provided_apis.iter().map(api_to_proto).collect(),
        required_apis: bundle.required_apis.iter().map(api_to_proto).collect(),
        dependencies: bundle.dependencies.iter().map(dependency_to_proto).collect(),
        properties: bundle.properties.iter().map(property_to_proto).collect(),
        replaces: bundle.replaces.map(|csv| csv.to_string()).unwrap_or_default(),
        skips: bundle.skips.iter().map(ToString::to_string).collect(),
        related_images: bundle.related_images.iter().map(related_image_to_proto).collect(),
    }
}

fn channel_to_proto(channel: &Channel) -> proto::Channel {
    proto::Channel { name: channel.name.to_string(), csv_name: channel.head.to_string() }
}

pub(crate) fn package_to_proto(package: Package) -> proto::Package {
    proto::Package {
        name: package.name.to_string(),
        channels: package.channels.iter().map(channel_to_proto).collect(),
        default_channel_name: package.default_channel.to_string(),
    }
}

/// `replaces` is resolved separately from the entry itself, since the
/// model's `ChannelEntry.replaces` is an internal entry id with no meaning
/// to a caller — `opreg_query::Querier::bundle_name_for_entry` turns it
/// into the CSV name the wire schema expects.
pub(crate) fn entry_to_proto(entry: &ChannelEntry, replaces: Option<&str>) -> proto::ChannelEntry {
    proto::ChannelEntry {
        package_name: entry.package_name.to_string(),
        channel_name: entry.channel_name.to_string(),
        bundle_name: entry.bundle_name.to_string(),
        replaces: replaces.unwrap_or_default().to_string(),
    }
}
