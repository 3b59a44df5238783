//! Table name constants shared by the migrator, the loader, and the
//! querier, so a rename only touches this file.

pub const OPERATORBUNDLE: &str = "operatorbundle";
pub const PACKAGE: &str = "package";
pub const CHANNEL: &str = "channel";
pub const CHANNEL_ENTRY: &str = "channel_entry";
pub const API: &str = "api";
pub const API_PROVIDER: &str = "api_provider";
pub const API_REQUIRER: &str = "api_requirer";
pub const RELATED_IMAGE: &str = "related_image";
pub const PROPERTIES: &str = "properties";
pub const DEPENDENCIES: &str = "dependencies";
pub const DEPRECATED: &str = "deprecated";
pub const SCHEMA_MIGRATIONS: &str = "schema_migrations";

/// The schema version this binary was built to understand. Opening a
/// database stamped with a higher version than this is refused rather
/// than silently misread (`spec.md` §4.3).
pub const LATEST_VERSION: i64 = 15;
