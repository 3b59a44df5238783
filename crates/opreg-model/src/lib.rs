//! Core data model for the operator catalog registry.
//!
//! This crate defines the entities of `spec.md` §3 (`Bundle`, `Package`,
//! `Channel`, `ChannelEntry`, `Api`, `Property`, `Dependency`,
//! `RelatedImage`) as plain Rust types with no dependency on how they are
//! parsed or persisted — those concerns live in `opreg-manifest` and
//! `opreg-store` respectively.

mod api;
mod bundle;
mod channel_entry;
mod dependency;
mod error;
mod names;
mod package;
mod property;
mod related_image;
mod update_mode;
mod version;

pub use api::Api;
pub use bundle::{Bundle, BundleKey};
pub use channel_entry::ChannelEntry;
pub use dependency::{Dependency, DependencyType};
pub use error::{Error, LoadErrors, Result};
pub use names::{ChannelName, CsvName, EntryId, PackageName};
pub use package::{Channel, ChannelManifest, Package, PackageManifest};
pub use property::{Property, PropertyType};
pub use related_image::RelatedImage;
pub use update_mode::UpdateMode;
pub use version::{SkipRange, Version};
